// SPDX-License-Identifier: GPL-3.0-or-later

use super::bitmap::Bitmap;

/// Whether any lit pixel lies within `margin` pixels of the image border.
///
/// Images that are not taller than the margin are not checked.
pub fn check_margin(bitmap: &Bitmap, margin: usize) -> bool {
    let height = bitmap.height();
    if height <= margin {
        return false;
    }

    let rows = bitmap.rows();

    if rows[..margin].iter().any(|row| !row.is_empty()) {
        return true;
    }

    if rows[height - margin..].iter().any(|row| !row.is_empty()) {
        return true;
    }

    // Empty when the top and bottom bands overlap.
    let interior = rows.get(margin..height - margin).unwrap_or(&[]);
    let right = bitmap.width().saturating_sub(margin);
    interior.iter().any(|row| {
        row.next_set_bit(0).map_or(false, |x| x < margin)
            || row.next_set_bit(right).is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_pixel(x: usize, y: usize) -> Bitmap {
        let mut bitmap = Bitmap::new(10, 10);
        bitmap.set(x, y);
        bitmap
    }

    #[test]
    fn test_centered_pixel_is_within_margin() {
        let bitmap = with_pixel(5, 5);
        assert!(!check_margin(&bitmap, 0));
        assert!(!check_margin(&bitmap, 3));
        assert!(!check_margin(&bitmap, 4));
        assert!(check_margin(&bitmap, 5));
        assert!(check_margin(&bitmap, 6));
    }

    #[test]
    fn test_each_border() {
        assert!(check_margin(&with_pixel(5, 1), 2)); // top
        assert!(check_margin(&with_pixel(5, 8), 2)); // bottom
        assert!(check_margin(&with_pixel(1, 5), 2)); // left
        assert!(check_margin(&with_pixel(8, 5), 2)); // right, at width - margin
        assert!(!check_margin(&with_pixel(7, 5), 2));
        assert!(!check_margin(&with_pixel(2, 2), 2));
    }

    #[test]
    fn test_short_images_are_not_checked() {
        let mut bitmap = Bitmap::new(10, 2);
        bitmap.set(0, 0);
        assert!(check_margin(&bitmap, 1));
        assert!(!check_margin(&bitmap, 2));
        assert!(!check_margin(&bitmap, 3));
    }

    #[test]
    fn test_overlapping_bands() {
        let bitmap = Bitmap::new(10, 5);
        assert!(!check_margin(&bitmap, 3));
        assert!(!check_margin(&bitmap, 4));
    }

    #[test]
    fn test_empty_image() {
        let bitmap = Bitmap::new(10, 10);
        assert!(!check_margin(&bitmap, 4));
    }
}
