use serde::Serialize;

use crate::proxy::RawPixmap;

/// An icon image sent by an item, converted to RGBA32.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pixmap {
    pub width: i32,
    pub height: i32,
    /// Row-major RGBA bytes, `width * height * 4` long.
    pub rgba: Vec<u8>,
}

impl Pixmap {
    /// Convert a pixmap from StatusNotifierItem's [Icon format] (ARGB32, network byte order).
    ///
    /// Returns `None` if the dimensions don't match the amount of data sent.
    ///
    /// [Icon format]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/Icons/
    pub fn from_argb32(width: i32, height: i32, mut data: Vec<u8>) -> Option<Self> {
        if width <= 0 || height <= 0 || data.len() != width as usize * height as usize * 4 {
            return None;
        }
        for chunk in data.chunks_exact_mut(4) {
            chunk.rotate_left(1);
        }
        Some(Pixmap { width, height, rgba: data })
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

/// From a list of pixmaps, pick the most appropriately sized one: the smallest one at least as
/// big as the requested size, otherwise the biggest.
///
/// Malformed pixmaps are skipped. Returns `None` if no usable pixmap is provided.
pub fn best_pixmap(pixmaps: Vec<RawPixmap>, size: i32) -> Option<Pixmap> {
    let wanted = size as i64 * size as i64;
    pixmaps
        .into_iter()
        .filter_map(|(w, h, d)| Pixmap::from_argb32(w, h, d))
        .max_by(|p1, p2| {
            let (a1, a2) = (p1.area(), p2.area());
            match (a1 >= wanted, a2 >= wanted) {
                (true, true) => a2.cmp(&a1),
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => a1.cmp(&a2),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(size: i32) -> RawPixmap {
        (size, size, vec![0xff; (size * size * 4) as usize])
    }

    #[test]
    fn test_argb_to_rgba() {
        let pixmap = Pixmap::from_argb32(1, 1, vec![0x80, 0x10, 0x20, 0x30]).unwrap();
        assert_eq!(pixmap.rgba, vec![0x10, 0x20, 0x30, 0x80]);
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        assert!(Pixmap::from_argb32(2, 2, vec![0; 4]).is_none());
        assert!(Pixmap::from_argb32(0, 0, vec![]).is_none());
    }

    #[test]
    fn test_best_pixmap_prefers_smallest_big_enough() {
        let best = best_pixmap(vec![raw(64), raw(16), raw(24), raw(32)], 22).unwrap();
        assert_eq!(best.width, 24);
    }

    #[test]
    fn test_best_pixmap_falls_back_to_biggest() {
        let best = best_pixmap(vec![raw(8), raw(16)], 22).unwrap();
        assert_eq!(best.width, 16);
    }

    #[test]
    fn test_best_pixmap_empty() {
        assert!(best_pixmap(vec![], 22).is_none());
        assert!(best_pixmap(vec![(4, 4, vec![0; 3])], 22).is_none());
    }
}
