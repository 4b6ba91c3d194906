//! Placement kernels: three concrete procedures (guillotine tree, MaxRects,
//! shelf) dispatched by the resolved mode. Every kernel works on its
//! own sprite slice and its own transient storage; a kernel that reports
//! success guarantees disjoint padded rectangles inside the reported bounds.

use crate::config::SortOrder;
use crate::model::Sprite;

pub mod guillotine;
pub mod maxrects;
pub mod shelf;

/// Sort orders tried by the compact search, in evaluation order.
pub const COMPACT_SORT_ORDERS: [SortOrder; 5] = [
    SortOrder::AreaDesc,
    SortOrder::MaxSideDesc,
    SortOrder::HeightDesc,
    SortOrder::WidthDesc,
    SortOrder::PerimeterDesc,
];

fn area(s: &Sprite) -> u64 {
    u64::from(s.w) * u64::from(s.h)
}

/// Sorts sprites for a placement attempt. All orders are descending; sorts
/// are stable so equal sprites keep their input order.
///
/// Tie-breaks: area falls back to height then width; max-side and perimeter
/// fall back to area; height falls back to width; width falls back to
/// height.
pub fn sort_sprites(sprites: &mut [Sprite], order: SortOrder) {
    match order {
        SortOrder::HeightDesc => {
            sprites.sort_by(|a, b| b.h.cmp(&a.h).then(b.w.cmp(&a.w)));
        }
        SortOrder::WidthDesc => {
            sprites.sort_by(|a, b| b.w.cmp(&a.w).then(b.h.cmp(&a.h)));
        }
        SortOrder::AreaDesc => {
            sprites.sort_by(|a, b| {
                area(b)
                    .cmp(&area(a))
                    .then(b.h.cmp(&a.h))
                    .then(b.w.cmp(&a.w))
            });
        }
        SortOrder::MaxSideDesc => {
            sprites.sort_by(|a, b| {
                b.w.max(b.h)
                    .cmp(&a.w.max(a.h))
                    .then(area(b).cmp(&area(a)))
            });
        }
        SortOrder::PerimeterDesc => {
            sprites.sort_by(|a, b| {
                (u64::from(b.w) + u64::from(b.h))
                    .cmp(&(u64::from(a.w) + u64::from(a.h)))
                    .then(area(b).cmp(&area(a)))
            });
        }
    }
}

/// Padded footprint of a sprite, or `None` on overflow (the attempt fails;
/// the pipeline pre-pass reports overflow fatally before kernels run).
pub(crate) fn padded(s: &Sprite, padding: u32) -> Option<(u32, u32)> {
    Some((s.w.checked_add(padding)?, s.h.checked_add(padding)?))
}
