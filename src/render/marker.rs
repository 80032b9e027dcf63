use crate::state::EntityRecord;
use image::Rgb;

/// Ids at or above this belong to the second category; the tag drawn for
/// them is `id - CATEGORY_OFFSET`
pub const CATEGORY_OFFSET: u64 = 100;

/// Marker circle radius in pixels
pub const MARKER_RADIUS: f32 = 10.0;

/// Tag text anchor (bottom-left), relative to the marker center
pub const TAG_OFFSET: (i32, i32) = (-6, 4);

/// Label text anchor (bottom-left), relative to the marker center
pub const LABEL_OFFSET: (i32, i32) = (-6, 20);

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Display group derived from the id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Red,
    Blue,
}

impl Category {
    /// Category and displayed tag for `id`
    pub fn classify(id: u64) -> (Self, u64) {
        if id < CATEGORY_OFFSET {
            (Category::Red, id)
        } else {
            (Category::Blue, id - CATEGORY_OFFSET)
        }
    }

    /// Outline color
    pub fn color(self) -> Rgb<u8> {
        match self {
            Category::Red => Rgb([255, 0, 0]),
            Category::Blue => Rgb([0, 0, 255]),
        }
    }

    /// Fill color, half intensity of the outline
    pub fn fill(self) -> Rgb<u8> {
        let Rgb([r, g, b]) = self.color();
        Rgb([r.div_ceil(2), g.div_ceil(2), b.div_ceil(2)])
    }
}

/// Linear map from field meters to background pixels.
///
/// Field y grows upward, raster rows grow downward, so y is flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTransform {
    field_width: f64,
    field_height: f64,
    pixel_width: u32,
    pixel_height: u32,
}

impl FieldTransform {
    pub fn new(field: (f64, f64), pixels: (u32, u32)) -> Self {
        Self {
            field_width: field.0,
            field_height: field.1,
            pixel_width: pixels.0,
            pixel_height: pixels.1,
        }
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }

    /// Pixel for a field position, truncated toward zero.
    ///
    /// Positions outside the field map outside the image; no clamping.
    pub fn to_pixel(&self, position: (f64, f64)) -> (i32, i32) {
        let x = f64::from(self.pixel_width) * position.0 / self.field_width;
        let y = f64::from(self.pixel_height) * (1.0 - position.1 / self.field_height);
        (x.trunc() as i32, y.trunc() as i32)
    }
}

/// Everything needed to draw one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: u64,
    pub category: Category,
    pub center: (i32, i32),
    pub radius: f32,
    pub fill: Rgb<u8>,
    pub outline: Rgb<u8>,
    /// Numeric tag with the category offset removed
    pub tag: String,
    pub label: String,
}

impl Marker {
    pub fn for_record(record: &EntityRecord, transform: &FieldTransform) -> Self {
        let (category, tag) = Category::classify(record.id);
        Self {
            id: record.id,
            category,
            center: transform.to_pixel(record.position),
            radius: MARKER_RADIUS,
            fill: category.fill(),
            outline: category.color(),
            tag: tag.to_string(),
            label: record.label.clone(),
        }
    }

    pub fn tag_anchor(&self) -> (i32, i32) {
        (self.center.0 + TAG_OFFSET.0, self.center.1 + TAG_OFFSET.1)
    }

    pub fn label_anchor(&self) -> (i32, i32) {
        (self.center.0 + LABEL_OFFSET.0, self.center.1 + LABEL_OFFSET.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> FieldTransform {
        FieldTransform::new((28.0, 15.0), (1400, 750))
    }

    #[test]
    fn test_origin_maps_to_bottom_left() {
        assert_eq!(transform().to_pixel((0.0, 0.0)), (0, 750));
    }

    #[test]
    fn test_far_corner_maps_to_top_right() {
        assert_eq!(transform().to_pixel((28.0, 15.0)), (1400, 0));
    }

    #[test]
    fn test_center_and_truncation() {
        let t = transform();
        assert_eq!(t.to_pixel((14.0, 7.5)), (700, 375));

        let small = FieldTransform::new((28.0, 15.0), (7, 15));
        // x = 7 * 2 / 28 = 0.5, y = 15 * (1 - 7.5 / 15) = 7.5
        assert_eq!(small.to_pixel((2.0, 7.5)), (0, 7));
        // x = 0.75
        assert_eq!(small.to_pixel((3.0, 15.0)), (0, 0));
        // x = -0.5 truncates toward zero, not down
        assert_eq!(small.to_pixel((-2.0, 15.0)), (0, 0));
    }

    #[test]
    fn test_outside_field_is_not_clamped() {
        assert_eq!(transform().to_pixel((-2.0, 30.0)), (-100, -750));
        assert_eq!(transform().to_pixel((42.0, -15.0)), (2100, 1500));
    }

    #[test]
    fn test_category_a() {
        let (category, tag) = Category::classify(5);
        assert_eq!(category, Category::Red);
        assert_eq!(tag, 5);
    }

    #[test]
    fn test_category_b_subtracts_offset() {
        let (category, tag) = Category::classify(105);
        assert_eq!(category, Category::Blue);
        assert_eq!(tag, 5);
    }

    #[test]
    fn test_category_boundary() {
        assert_eq!(Category::classify(99), (Category::Red, 99));
        assert_eq!(Category::classify(100), (Category::Blue, 0));
    }

    #[test]
    fn test_marker_for_record() {
        let record = EntityRecord {
            id: 105,
            position: (14.0, 7.5),
            label: "moving".to_string(),
        };

        let marker = Marker::for_record(&record, &transform());
        assert_eq!(marker.category, Category::Blue);
        assert_eq!(marker.tag, "5");
        assert_eq!(marker.label, "moving");
        assert_eq!(marker.center, (700, 375));
        assert_eq!(marker.outline, Rgb([0, 0, 255]));
        assert_eq!(marker.fill, Rgb([0, 0, 128]));
        assert_eq!(marker.tag_anchor(), (694, 379));
        assert_eq!(marker.label_anchor(), (694, 395));
    }
}
