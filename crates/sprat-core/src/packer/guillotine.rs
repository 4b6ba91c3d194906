//! Guillotine-tree kernel used by the power-of-two search. Every placement
//! marks a node used and splits the leftover space into an owned right
//! child (remaining row width) and an owned down child (remaining height).

use crate::model::Sprite;

use super::padded;

struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<Box<Node>>,
    down: Option<Box<Node>>,
}

impl Node {
    fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

fn insert(node: &mut Node, w: u32, h: u32) -> Option<(u32, u32)> {
    if node.used {
        if let Some(right) = node.right.as_deref_mut() {
            if let Some(pos) = insert(right, w, h) {
                return Some(pos);
            }
        }
        if let Some(down) = node.down.as_deref_mut() {
            return insert(down, w, h);
        }
        return None;
    }
    if w > node.w || h > node.h {
        return None;
    }
    node.used = true;
    if w == node.w && h == node.h {
        return Some((node.x, node.y));
    }
    node.down = Some(Box::new(Node::new(
        node.x,
        node.y + h,
        node.w,
        node.h - h,
    )));
    node.right = Some(Box::new(Node::new(node.x + w, node.y, node.w - w, h)));
    Some((node.x, node.y))
}

/// Attempts to place every sprite (in slice order) into a `width` x `height`
/// cell. Returns false as soon as one sprite does not fit; positions of
/// already-placed sprites are left behind but the caller discards the slice
/// on failure. The tree is dropped when the call returns.
pub fn try_pack(sprites: &mut [Sprite], width: u32, height: u32, padding: u32) -> bool {
    let mut root = Node::new(0, 0, width, height);
    for sprite in sprites.iter_mut() {
        let Some((w, h)) = padded(sprite, padding) else {
            return false;
        };
        match insert(&mut root, w, h) {
            Some((x, y)) => {
                sprite.x = x;
                sprite.y = y;
            }
            None => return false,
        }
    }
    true
}
