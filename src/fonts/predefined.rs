//! Predefined CMap registry.
//!
//! Process-wide, immutable after first use, readable without locks once
//! built. `Identity-H`/`Identity-V` are exact; the UCS2-flavoured CJK
//! encodings are served as two-byte identity code spaces whose CIDs then
//! resolve through the collection tables in [`crate::fonts::cid_mappings`]
//! — the approximation every extraction-oriented reader ships unless it
//! bundles the full Adobe CMap data files.

use crate::fonts::cmap::CMap;
use std::collections::HashMap;
use std::sync::Arc;

struct Registry {
    cmaps: HashMap<&'static str, Arc<CMap>>,
}

impl Registry {
    fn build() -> Self {
        let mut cmaps: HashMap<&'static str, Arc<CMap>> = HashMap::new();

        cmaps.insert("Identity-H", Arc::new(CMap::identity("Identity-H", 0)));
        cmaps.insert("Identity-V", Arc::new(CMap::identity("Identity-V", 1)));

        // Two-byte encodings over the standard CJK collections. The code
        // space is identity; the ordering routes CID lookup to the right
        // collection table.
        let collections: &[(&'static [&'static str], &str, u8)] = &[
            (&["UniGB-UCS2-H", "UniGB-UTF16-H", "GBK-EUC-H"], "GB1", 0),
            (&["UniGB-UCS2-V", "UniGB-UTF16-V", "GBK-EUC-V"], "GB1", 1),
            (&["UniCNS-UCS2-H", "UniCNS-UTF16-H", "B5pc-H", "ETen-B5-H"], "CNS1", 0),
            (&["UniCNS-UCS2-V", "UniCNS-UTF16-V", "B5pc-V", "ETen-B5-V"], "CNS1", 1),
            (&["UniJIS-UCS2-H", "UniJIS-UTF16-H", "90ms-RKSJ-H", "EUC-H"], "Japan1", 0),
            (&["UniJIS-UCS2-V", "UniJIS-UTF16-V", "90ms-RKSJ-V", "EUC-V"], "Japan1", 1),
            (&["UniKS-UCS2-H", "UniKS-UTF16-H", "KSC-EUC-H", "KSCms-UHC-H"], "Korea1", 0),
            (&["UniKS-UCS2-V", "UniKS-UTF16-V", "KSC-EUC-V", "KSCms-UHC-V"], "Korea1", 1),
        ];
        for &(names, ordering, wmode) in collections {
            for &name in names {
                let mut cmap = CMap::identity(name, wmode);
                cmap.ordering = ordering.to_string();
                cmaps.insert(name, Arc::new(cmap));
            }
        }

        Self { cmaps }
    }
}

lazy_static::lazy_static! {
    static ref REGISTRY: Registry = Registry::build();
}

/// Look up a predefined CMap by name.
///
/// Unknown names return `None`; the caller falls back to Identity-H so an
/// exotic encoding degrades to raw CIDs rather than lost text.
pub fn predefined_cmap(name: &str) -> Option<Arc<CMap>> {
    let hit = REGISTRY.cmaps.get(name).cloned();
    if hit.is_none() {
        log::debug!("no predefined CMap for /{}", name);
    }
    hit
}

/// True when the name is one of the registered predefined CMaps.
pub fn is_predefined(name: &str) -> bool {
    REGISTRY.cmaps.contains_key(name)
}
