//! Transformation matrices and the graphics state stack.
//!
//! PDF transforms are 2x3 affine matrices written `[a b c d e f]`:
//!
//! ```text
//! [ a  b  0 ]
//! [ c  d  0 ]
//! [ e  f  1 ]
//! ```
//!
//! `q` pushes the graphics state, `Q` pops it; the text matrices live in a
//! separate sub-state reset at every `BT`.

use crate::fonts::Font;
use std::sync::Arc;

/// A 2D affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scaling
    pub a: f32,
    /// Vertical skew
    pub b: f32,
    /// Horizontal skew
    pub c: f32,
    /// Vertical scaling
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Pure translation.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    /// Build from the six operands of `cm` / `Tm`.
    pub fn from_parts(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self x other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform the point `(x, y)`.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Transform the vector `(dx, dy)` (translation ignored).
    pub fn apply_vector(&self, dx: f32, dy: f32) -> (f32, f32) {
        (self.a * dx + self.c * dy, self.b * dx + self.d * dy)
    }

    /// Orientation of the transformed x-axis, quantised to quarter turns.
    pub fn quadrant_rotation(&self) -> u16 {
        let (dx, dy) = self.apply_vector(1.0, 0.0);
        if dx.abs() >= dy.abs() {
            if dx >= 0.0 {
                0
            } else {
                180
            }
        } else if dy > 0.0 {
            90
        } else {
            270
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Parameters saved and restored by `q`/`Q`.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix (user space to device space)
    pub ctm: Matrix,
    /// Active font, resolved from the resource dictionary at `Tf`
    pub font: Option<Arc<Font>>,
    /// Font size set by `Tf`
    pub font_size: f32,
    /// Character spacing (`Tc`)
    pub char_spacing: f32,
    /// Word spacing (`Tw`), applied to single-byte code 32
    pub word_spacing: f32,
    /// Horizontal scaling (`Tz`), stored as a fraction (100% = 1.0)
    pub horizontal_scaling: f32,
    /// Text leading (`TL`)
    pub leading: f32,
    /// Text rise (`Ts`)
    pub text_rise: f32,
    /// Text rendering mode (`Tr`); mode 3 is invisible but still text
    pub render_mode: u8,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            text_rise: 0.0,
            render_mode: 0,
        }
    }
}

/// Text-object sub-state, live between `BT` and `ET`.
#[derive(Debug, Clone, Default)]
pub struct TextState {
    /// Current text matrix
    pub matrix: Matrix,
    /// Line matrix: start-of-line position, updated by `Td`/`TD`/`Tm`/`T*`
    pub line_matrix: Matrix,
}

impl TextState {
    /// Reset both matrices to identity, as `BT` does.
    pub fn reset(&mut self) {
        self.matrix = Matrix::identity();
        self.line_matrix = Matrix::identity();
    }

    /// Move to the next line displaced by `(tx, ty)` from the line start.
    pub fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.matrix = self.line_matrix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let m = Matrix::identity();
        assert_eq!(m.apply(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn test_translation() {
        let m = Matrix::translation(10.0, 20.0);
        assert_eq!(m.apply(5.0, 5.0), (15.0, 25.0));
        // Vectors ignore translation.
        assert_eq!(m.apply_vector(5.0, 5.0), (5.0, 5.0));
    }

    #[test]
    fn test_multiply_order() {
        let translate = Matrix::translation(10.0, 0.0);
        let scale = Matrix::from_parts(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        // Translate then scale: the offset is scaled too.
        let combined = translate.multiply(&scale);
        assert_eq!(combined.apply(0.0, 0.0), (20.0, 0.0));
        // Scale then translate: offset unscaled.
        let combined = scale.multiply(&translate);
        assert_eq!(combined.apply(0.0, 0.0), (10.0, 0.0));
    }

    #[test]
    fn test_quadrant_rotation() {
        assert_eq!(Matrix::identity().quadrant_rotation(), 0);
        // 90-degree rotation: [0 1 -1 0].
        let rot = Matrix::from_parts(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        assert_eq!(rot.quadrant_rotation(), 90);
        let rot180 = Matrix::from_parts(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0);
        assert_eq!(rot180.quadrant_rotation(), 180);
        let rot270 = Matrix::from_parts(0.0, -1.0, 1.0, 0.0, 0.0, 0.0);
        assert_eq!(rot270.quadrant_rotation(), 270);
    }

    #[test]
    fn test_text_state_next_line() {
        let mut ts = TextState::default();
        ts.next_line(0.0, -14.0);
        assert_eq!(ts.matrix.f, -14.0);
        ts.next_line(0.0, -14.0);
        assert_eq!(ts.matrix.f, -28.0);
        assert_eq!(ts.matrix, ts.line_matrix);
    }

    #[test]
    fn test_default_graphics_state() {
        let gs = GraphicsState::default();
        assert_eq!(gs.horizontal_scaling, 1.0);
        assert_eq!(gs.render_mode, 0);
        assert!(gs.font.is_none());
    }
}
