//! MaxRects kernel used by the compact search. Maintains the set of maximal
//! free rectangles; each placement splits every overlapping free rectangle
//! into the strips around the used area and prunes contained rectangles.

use crate::config::RectHeuristic;
use crate::model::Sprite;

use super::padded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Rect {
    fn right(&self) -> u32 {
        self.x + self.w
    }
    fn bottom(&self) -> u32 {
        self.y + self.h
    }
    fn intersects(&self, other: &Rect) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }
    fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Splits `free` around `used`, appending the surviving strips to `out`.
/// Non-overlapping rectangles pass through untouched.
fn split_free_rect(free: Rect, used: &Rect, out: &mut Vec<Rect>) {
    if !free.intersects(used) {
        out.push(free);
        return;
    }

    // left strip, full height
    if used.x > free.x {
        out.push(Rect {
            x: free.x,
            y: free.y,
            w: used.x - free.x,
            h: free.h,
        });
    }
    // right strip, full height
    if used.right() < free.right() {
        out.push(Rect {
            x: used.right(),
            y: free.y,
            w: free.right() - used.right(),
            h: free.h,
        });
    }
    // top and bottom strips, clipped to the used rectangle's x-span
    let x0 = free.x.max(used.x);
    let x1 = free.right().min(used.right());
    if x1 > x0 {
        if used.y > free.y {
            out.push(Rect {
                x: x0,
                y: free.y,
                w: x1 - x0,
                h: used.y - free.y,
            });
        }
        if used.bottom() < free.bottom() {
            out.push(Rect {
                x: x0,
                y: used.bottom(),
                w: x1 - x0,
                h: free.bottom() - used.bottom(),
            });
        }
    }
}

/// Drops every free rectangle fully contained in another.
fn prune_free_rects(rects: &mut Vec<Rect>) {
    let mut i = 0;
    while i < rects.len() {
        let mut removed_i = false;
        let mut j = i + 1;
        while j < rects.len() {
            if rects[i].contains(&rects[j]) {
                rects.remove(j);
                continue;
            }
            if rects[j].contains(&rects[i]) {
                rects.remove(i);
                removed_i = true;
                break;
            }
            j += 1;
        }
        if !removed_i {
            i += 1;
        }
    }
}

/// Packs every sprite (in slice order) within `width_limit` x `height_limit`
/// and returns the used extent `(w, h)`, or `None` when any sprite cannot be
/// placed. The free list lives only for the duration of the call.
pub fn pack(
    sprites: &mut [Sprite],
    width_limit: u32,
    height_limit: u32,
    padding: u32,
    heuristic: RectHeuristic,
) -> Option<(u32, u32)> {
    if width_limit == 0 || height_limit == 0 {
        return None;
    }

    let mut free_rects = vec![Rect {
        x: 0,
        y: 0,
        w: width_limit,
        h: height_limit,
    }];
    let mut used_w = 0u32;
    let mut used_h = 0u32;

    for sprite in sprites.iter_mut() {
        let (rw, rh) = padded(sprite, padding)?;
        if rw == 0 || rh == 0 || rw > width_limit || rh > height_limit {
            return None;
        }

        let mut best_index = None;
        let mut best_short_fit = u32::MAX;
        let mut best_long_fit = u32::MAX;
        let mut best_area_fit = u64::MAX;
        let mut best_top = u32::MAX;
        let mut best_left = u32::MAX;

        for (i, fr) in free_rects.iter().enumerate() {
            if rw > fr.w || rh > fr.h {
                continue;
            }
            let leftover_w = fr.w - rw;
            let leftover_h = fr.h - rh;
            let short_fit = leftover_w.min(leftover_h);
            let long_fit = leftover_w.max(leftover_h);
            let area_fit = u64::from(leftover_w) * u64::from(leftover_h);

            let better = match heuristic {
                RectHeuristic::BestShortSideFit => {
                    short_fit < best_short_fit
                        || (short_fit == best_short_fit && long_fit < best_long_fit)
                        || (short_fit == best_short_fit
                            && long_fit == best_long_fit
                            && fr.y < best_top)
                        || (short_fit == best_short_fit
                            && long_fit == best_long_fit
                            && fr.y == best_top
                            && fr.x < best_left)
                }
                RectHeuristic::BestAreaFit => {
                    area_fit < best_area_fit
                        || (area_fit == best_area_fit && short_fit < best_short_fit)
                        || (area_fit == best_area_fit
                            && short_fit == best_short_fit
                            && fr.y < best_top)
                        || (area_fit == best_area_fit
                            && short_fit == best_short_fit
                            && fr.y == best_top
                            && fr.x < best_left)
                }
                RectHeuristic::BottomLeft => {
                    fr.y < best_top
                        || (fr.y == best_top && fr.x < best_left)
                        || (fr.y == best_top && fr.x == best_left && short_fit < best_short_fit)
                }
            };

            if better {
                best_index = Some(i);
                best_short_fit = short_fit;
                best_long_fit = long_fit;
                best_area_fit = area_fit;
                best_top = fr.y;
                best_left = fr.x;
            }
        }

        let chosen = &free_rects[best_index?];
        let used = Rect {
            x: chosen.x,
            y: chosen.y,
            w: rw,
            h: rh,
        };
        sprite.x = used.x;
        sprite.y = used.y;
        used_w = used_w.max(used.right());
        used_h = used_h.max(used.bottom());

        let mut next_free = Vec::with_capacity(free_rects.len() * 2);
        for fr in &free_rects {
            split_free_rect(*fr, &used, &mut next_free);
        }
        next_free.retain(|r| r.w > 0 && r.h > 0);
        prune_free_rects(&mut next_free);
        free_rects = next_free;
    }

    (used_w > 0 && used_h > 0).then_some((used_w, used_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_produces_disjoint_strips() {
        let free = Rect {
            x: 0,
            y: 0,
            w: 10,
            h: 10,
        };
        let used = Rect {
            x: 2,
            y: 3,
            w: 4,
            h: 4,
        };
        let mut out = Vec::new();
        split_free_rect(free, &used, &mut out);
        assert_eq!(out.len(), 4);
        for r in &out {
            assert!(!r.intersects(&used));
        }
    }

    #[test]
    fn prune_removes_contained() {
        let mut rects = vec![
            Rect {
                x: 0,
                y: 0,
                w: 10,
                h: 10,
            },
            Rect {
                x: 2,
                y: 2,
                w: 3,
                h: 3,
            },
            Rect {
                x: 8,
                y: 0,
                w: 6,
                h: 4,
            },
        ];
        prune_free_rects(&mut rects);
        assert_eq!(rects.len(), 2);
    }

    #[test]
    fn bottom_left_fills_rows_first() {
        let mut sprites = vec![
            Sprite::new("a", 4, 4),
            Sprite::new("b", 4, 4),
            Sprite::new("c", 4, 4),
        ];
        let (w, h) = pack(&mut sprites, 8, 64, 0, RectHeuristic::BottomLeft).unwrap();
        assert_eq!((w, h), (8, 8));
        assert_eq!((sprites[0].x, sprites[0].y), (0, 0));
        assert_eq!((sprites[1].x, sprites[1].y), (4, 0));
        assert_eq!((sprites[2].x, sprites[2].y), (0, 4));
    }

    #[test]
    fn fails_when_a_sprite_exceeds_the_caps() {
        let mut sprites = vec![Sprite::new("a", 9, 2)];
        assert!(pack(&mut sprites, 8, 64, 0, RectHeuristic::BestAreaFit).is_none());
    }
}
