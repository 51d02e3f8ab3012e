//! Color parsing and WCAG 2.x contrast computation.
//!
//! Pure functions, no I/O. Used by the `check_contrast` tool and available to
//! tool executors that want to grade a palette.

use serde::Serialize;

use crate::error::{AgentError, Result};

/// An sRGB color with straight (non-premultiplied) alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    const fn from_hex(rgb: u32) -> Self {
        Self::opaque((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }
}

/// Named colors models reach for most often.
const NAMED_COLORS: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("red", 0xff0000),
    ("green", 0x008000),
    ("blue", 0x0000ff),
    ("yellow", 0xffff00),
    ("orange", 0xffa500),
    ("purple", 0x800080),
    ("pink", 0xffc0cb),
    ("brown", 0xa52a2a),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("silver", 0xc0c0c0),
    ("maroon", 0x800000),
    ("olive", 0x808000),
    ("lime", 0x00ff00),
    ("navy", 0x000080),
    ("teal", 0x008080),
    ("aqua", 0x00ffff),
    ("cyan", 0x00ffff),
    ("fuchsia", 0xff00ff),
    ("magenta", 0xff00ff),
    ("gold", 0xffd700),
    ("indigo", 0x4b0082),
    ("violet", 0xee82ee),
    ("crimson", 0xdc143c),
    ("coral", 0xff7f50),
    ("tomato", 0xff6347),
    ("salmon", 0xfa8072),
    ("beige", 0xf5f5dc),
    ("ivory", 0xfffff0),
    ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa),
    ("tan", 0xd2b48c),
    ("turquoise", 0x40e0d0),
    ("skyblue", 0x87ceeb),
    ("steelblue", 0x4682b4),
    ("royalblue", 0x4169e1),
    ("dodgerblue", 0x1e90ff),
    ("midnightblue", 0x191970),
    ("darkblue", 0x00008b),
    ("darkgreen", 0x006400),
    ("darkred", 0x8b0000),
    ("forestgreen", 0x228b22),
    ("seagreen", 0x2e8b57),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("darkgray", 0xa9a9a9),
    ("darkgrey", 0xa9a9a9),
    ("lightgray", 0xd3d3d3),
    ("lightgrey", 0xd3d3d3),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("gainsboro", 0xdcdcdc),
    ("whitesmoke", 0xf5f5f5),
    ("rebeccapurple", 0x663399),
];

/// Parse a CSS color value.
pub fn parse_color(input: &str) -> Option<Rgba> {
    let value = input.trim().to_ascii_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if value == "transparent" {
        return Some(Rgba {
            r: 0,
            g: 0,
            b: 0,
            a: 0.0,
        });
    }
    if let Some((name, args)) = value.split_once('(') {
        let args = args.strip_suffix(')')?;
        return match name.trim() {
            "rgb" | "rgba" => parse_rgb_function(args),
            "hsl" | "hsla" => parse_hsl_function(args),
            _ => None,
        };
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, rgb)| Rgba::from_hex(*rgb))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (r, g, b, a) = match hex.len() {
        3 | 4 => {
            let short = |i| digit(i).map(|d| d * 17);
            let a = if hex.len() == 4 { short(3)? } else { 255 };
            (short(0)?, short(1)?, short(2)?, a)
        }
        6 | 8 => {
            let a = if hex.len() == 8 { pair(6)? } else { 255 };
            (pair(0)?, pair(2)?, pair(4)?, a)
        }
        _ => return None,
    };
    Some(Rgba {
        r,
        g,
        b,
        a: f64::from(a) / 255.0,
    })
}

/// Function arguments split on commas, whitespace and the `/` alpha
/// separator.
fn function_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_alpha(token: &str) -> Option<f64> {
    let alpha = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => token.parse::<f64>().ok()?,
    };
    Some(alpha.clamp(0.0, 1.0))
}

fn parse_channel(token: &str) -> Option<u8> {
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? * 255.0 / 100.0,
        None => token.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_rgb_function(args: &str) -> Option<Rgba> {
    let parts = function_args(args);
    if !(3..=4).contains(&parts.len()) {
        return None;
    }
    let a = match parts.get(3) {
        Some(token) => parse_alpha(token)?,
        None => 1.0,
    };
    Some(Rgba {
        r: parse_channel(parts[0])?,
        g: parse_channel(parts[1])?,
        b: parse_channel(parts[2])?,
        a,
    })
}

fn parse_hue(token: &str) -> Option<f64> {
    let degrees = if let Some(turns) = token.strip_suffix("turn") {
        turns.parse::<f64>().ok()? * 360.0
    } else if let Some(rad) = token.strip_suffix("rad") {
        rad.parse::<f64>().ok()?.to_degrees()
    } else {
        token.strip_suffix("deg").unwrap_or(token).parse::<f64>().ok()?
    };
    Some(degrees.rem_euclid(360.0))
}

fn parse_percentage(token: &str) -> Option<f64> {
    let value = token.strip_suffix('%').unwrap_or(token).parse::<f64>().ok()?;
    Some((value / 100.0).clamp(0.0, 1.0))
}

fn parse_hsl_function(args: &str) -> Option<Rgba> {
    let parts = function_args(args);
    if !(3..=4).contains(&parts.len()) {
        return None;
    }
    let h = parse_hue(parts[0])?;
    let s = parse_percentage(parts[1])?;
    let l = parse_percentage(parts[2])?;
    let a = match parts.get(3) {
        Some(token) => parse_alpha(token)?,
        None => 1.0,
    };

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Some(Rgba {
        r: to_u8(r),
        g: to_u8(g),
        b: to_u8(b),
        a,
    })
}

/// Alpha-composite `fg` over an opaque version of `bg`.
pub fn composite(fg: Rgba, bg: Rgba) -> Rgba {
    let bg = if bg.a < 1.0 {
        composite(bg, Rgba::WHITE)
    } else {
        bg
    };
    let mix = |f: u8, b: u8| (f64::from(f) * fg.a + f64::from(b) * (1.0 - fg.a)).round() as u8;
    Rgba::opaque(mix(fg.r, bg.r), mix(fg.g, bg.g), mix(fg.b, bg.b))
}

/// WCAG relative luminance of the color's RGB channels.
pub fn relative_luminance(color: Rgba) -> f64 {
    let linear = |channel: u8| {
        let c = f64::from(channel) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(color.r) + 0.7152 * linear(color.g) + 0.0722 * linear(color.b)
}

/// Contrast ratio in `1.0..=21.0`. Translucent colors are flattened first:
/// the background over white, then the foreground over the background.
pub fn contrast_ratio(foreground: Rgba, background: Rgba) -> f64 {
    let background = composite(background, Rgba::WHITE);
    let foreground = composite(foreground, background);
    let l1 = relative_luminance(foreground);
    let l2 = relative_luminance(background);
    let (lighter, darker) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Contrast ratio with pass/fail against the WCAG thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContrastReport {
    /// Rounded to two decimals.
    pub ratio: f64,
    /// Normal text, level AA (4.5:1).
    pub aa_normal: bool,
    /// Large text, level AA (3:1).
    pub aa_large: bool,
    /// Normal text, level AAA (7:1).
    pub aaa_normal: bool,
    /// Large text, level AAA (4.5:1).
    pub aaa_large: bool,
}

impl ContrastReport {
    pub fn from_ratio(ratio: f64) -> Self {
        Self {
            ratio: (ratio * 100.0).round() / 100.0,
            aa_normal: ratio >= 4.5,
            aa_large: ratio >= 3.0,
            aaa_normal: ratio >= 7.0,
            aaa_large: ratio >= 4.5,
        }
    }
}

/// Parse both colors and grade their contrast.
pub fn check_contrast(foreground: &str, background: &str) -> Result<ContrastReport> {
    let fg = parse_color(foreground)
        .ok_or_else(|| AgentError::validation(format!("unrecognised color `{foreground}`")))?;
    let bg = parse_color(background)
        .ok_or_else(|| AgentError::validation(format!("unrecognised color `{background}`")))?;
    Ok(ContrastReport::from_ratio(contrast_ratio(fg, bg)))
}
