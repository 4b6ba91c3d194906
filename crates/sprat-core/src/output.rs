//! Canonical layout text format, the contract every downstream tool
//! consumes:
//!
//! ```text
//! atlas <W>,<H>
//! scale <S>
//! sprite "<path>" <x>,<y> <w>,<h> [<tl>,<tt> <tr>,<tb>]
//! ```
//!
//! The encoder always emits the comma form; the parser also accepts the
//! legacy whitespace form `atlas <W> <H>`.

use std::fmt::Write as _;

use crate::error::{Result, SpratError};
use crate::model::{AtlasLayout, Sprite};
use crate::text::{Scanner, push_quoted};

/// Renders a layout as canonical text. The scale keeps eight digits after
/// the decimal point so at least eight significant digits survive.
pub fn encode_layout(
    atlas_width: u32,
    atlas_height: u32,
    scale: f64,
    trim_transparent: bool,
    sprites: &[Sprite],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "atlas {atlas_width},{atlas_height}");
    let _ = writeln!(out, "scale {scale:.8}");
    for s in sprites {
        out.push_str("sprite ");
        push_quoted(&mut out, &s.path);
        let _ = write!(out, " {},{} {},{}", s.x, s.y, s.w, s.h);
        if trim_transparent {
            let _ = write!(
                out,
                " {},{} {},{}",
                s.trim_left, s.trim_top, s.trim_right, s.trim_bottom
            );
        }
        out.push('\n');
    }
    out
}

fn bad(line_number: usize, what: &str) -> SpratError {
    SpratError::InvalidInput(format!("{what} at line {line_number}"))
}

fn parse_pair(token: &str) -> Option<(u32, u32)> {
    let (a, b) = token.split_once(',')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

/// Parses layout text produced by this encoder or by older tools (the
/// legacy `atlas <W> <H>` header form is accepted).
pub fn parse_layout(text: &str) -> Result<AtlasLayout> {
    let mut width_height: Option<(u32, u32)> = None;
    let mut scale = 1.0f64;
    let mut sprites = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut sc = Scanner::new(line);
        match sc.token() {
            Some("atlas") => {
                let first = sc.token().ok_or_else(|| bad(line_number, "bad atlas line"))?;
                let dims = if let Some(pair) = parse_pair(first) {
                    pair
                } else {
                    let w = first
                        .parse()
                        .map_err(|_| bad(line_number, "bad atlas width"))?;
                    let h = sc.u32().ok_or_else(|| bad(line_number, "bad atlas height"))?;
                    (w, h)
                };
                if dims.0 == 0 || dims.1 == 0 {
                    return Err(bad(line_number, "atlas dimensions must be positive"));
                }
                width_height = Some(dims);
            }
            Some("scale") => {
                let tok = sc.token().ok_or_else(|| bad(line_number, "bad scale line"))?;
                scale = tok.parse().map_err(|_| bad(line_number, "bad scale value"))?;
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(bad(line_number, "scale must be positive"));
                }
            }
            Some("sprite") => {
                let path = sc
                    .quoted()
                    .ok_or_else(|| bad(line_number, "bad sprite path"))?;
                let pos = sc
                    .token()
                    .and_then(parse_pair)
                    .ok_or_else(|| bad(line_number, "bad sprite position"))?;
                let size = sc
                    .token()
                    .and_then(parse_pair)
                    .ok_or_else(|| bad(line_number, "bad sprite size"))?;
                let mut sprite = Sprite::new(path, size.0, size.1);
                sprite.x = pos.0;
                sprite.y = pos.1;
                if let Some(tok) = sc.token() {
                    let lt = parse_pair(tok).ok_or_else(|| bad(line_number, "bad trim pair"))?;
                    let rb = sc
                        .token()
                        .and_then(parse_pair)
                        .ok_or_else(|| bad(line_number, "bad trim pair"))?;
                    sprite.trim_left = lt.0;
                    sprite.trim_top = lt.1;
                    sprite.trim_right = rb.0;
                    sprite.trim_bottom = rb.1;
                }
                sprites.push(sprite);
            }
            Some(other) => {
                return Err(bad(line_number, &format!("unknown record '{other}'")));
            }
            None => {}
        }
    }

    let (width, height) =
        width_height.ok_or_else(|| SpratError::InvalidInput("missing atlas line".into()))?;
    Ok(AtlasLayout {
        width,
        height,
        scale,
        sprites,
    })
}
