use serde::{Deserialize, Serialize};

use super::color::Color;

/// Palette lookup used when accumulating emissions: maps a particle's color
/// factor (normally in `[0, 1]`) to an RGBA contribution.
pub trait ColorMap: Send + Sync {
    fn map(&self, factor: f32) -> Color;
}

/// A color stop at a position along the gradient [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f32,
    pub color: Color,
}

/// A color gradient defined by stops with linear RGBA interpolation.
/// Stops are always sorted by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorGradientRaw")]
pub struct ColorGradient {
    stops: Vec<ColorStop>,
}

#[derive(Deserialize)]
struct ColorGradientRaw {
    stops: Vec<ColorStop>,
}

impl TryFrom<ColorGradientRaw> for ColorGradient {
    type Error = String;
    fn try_from(raw: ColorGradientRaw) -> Result<Self, String> {
        ColorGradient::new(raw.stops)
            .ok_or_else(|| "ColorGradient requires at least 1 stop".to_string())
    }
}

impl ColorGradient {
    /// Create a gradient from stops. Requires at least 1 stop.
    /// Positions are clamped to [0, 1] and sorted.
    pub fn new(mut stops: Vec<ColorStop>) -> Option<Self> {
        if stops.is_empty() {
            return None;
        }
        for s in &mut stops {
            s.position = s.position.clamp(0.0, 1.0);
        }
        stops.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(Self { stops })
    }

    /// Evenly spaced stops.
    pub fn evenly_spaced(colors: &[Color]) -> Option<Self> {
        let last = colors.len().checked_sub(1)?;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, &color)| ColorStop {
                position: if last == 0 { 0.0 } else { i as f32 / last as f32 },
                color,
            })
            .collect();
        Self::new(stops)
    }

    /// Gradient between two colors.
    pub fn two_color(start: Color, end: Color) -> Self {
        Self {
            stops: vec![
                ColorStop {
                    position: 0.0,
                    color: start,
                },
                ColorStop {
                    position: 1.0,
                    color: end,
                },
            ],
        }
    }

    /// Access the underlying stops.
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Evaluate the gradient at a position (clamped to [0, 1]; NaN maps to the first stop).
    pub fn evaluate(&self, pos: f32) -> Color {
        let pos = if pos.is_nan() { 0.0 } else { pos.clamp(0.0, 1.0) };

        let idx = self.stops.partition_point(|s| s.position <= pos);

        let (Some(a), Some(b)) = (
            idx.checked_sub(1).and_then(|i| self.stops.get(i)),
            self.stops.get(idx),
        ) else {
            // Before the first stop or past the last one.
            let edge = if idx == 0 {
                self.stops.first()
            } else {
                self.stops.last()
            };
            return edge.map_or(Color::ZERO, |s| s.color);
        };

        let dp = b.position - a.position;
        if dp <= 0.0 {
            return a.color;
        }
        a.color.lerp(b.color, (pos - a.position) / dp)
    }
}

impl ColorMap for ColorGradient {
    fn map(&self, factor: f32) -> Color {
        self.evaluate(factor)
    }
}

/// Built-in palettes addressable by name.
pub mod palettes {
    use super::{Color, ColorGradient};

    pub const NAMES: [&str; 4] = ["fire", "ice", "grayscale", "rainbow"];

    pub fn by_name(name: &str) -> Option<ColorGradient> {
        match name {
            "fire" => ColorGradient::evenly_spaced(&[
                Color::from_rgb8(32, 0, 0),
                Color::from_rgb8(200, 40, 0),
                Color::from_rgb8(255, 160, 20),
                Color::from_rgb8(255, 250, 210),
            ]),
            "ice" => ColorGradient::evenly_spaced(&[
                Color::from_rgb8(0, 8, 40),
                Color::from_rgb8(20, 90, 200),
                Color::from_rgb8(160, 230, 255),
            ]),
            "grayscale" => Some(ColorGradient::two_color(Color::BLACK, Color::WHITE)),
            "rainbow" => {
                let colors: Vec<Color> = (0..=6)
                    .map(|i| Color::from_hsv(i as f32 * 50.0, 1.0, 1.0))
                    .collect();
                ColorGradient::evenly_spaced(&colors)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_two_color_gradient() {
        let g = ColorGradient::two_color(Color::BLACK, Color::WHITE);
        let mid = g.evaluate(0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);
        assert!((mid.a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_clamping() {
        let g = ColorGradient::two_color(Color::BLACK, Color::WHITE);
        assert_eq!(g.evaluate(-1.0), Color::BLACK);
        assert_eq!(g.evaluate(2.0), Color::WHITE);
        assert_eq!(g.evaluate(f32::NAN), Color::BLACK);
    }

    #[test]
    fn test_single_stop_is_solid() {
        let g = ColorGradient::new(vec![ColorStop {
            position: 0.3,
            color: Color::rgb(0.2, 0.4, 0.6),
        }])
        .unwrap();
        assert_eq!(g.evaluate(0.0), Color::rgb(0.2, 0.4, 0.6));
        assert_eq!(g.evaluate(0.9), Color::rgb(0.2, 0.4, 0.6));
    }

    #[test]
    fn test_new_requires_min_stops() {
        assert!(ColorGradient::new(vec![]).is_none());
        assert!(ColorGradient::evenly_spaced(&[]).is_none());
    }

    #[test]
    fn test_new_sorts_stops() {
        let g = ColorGradient::new(vec![
            ColorStop {
                position: 1.0,
                color: Color::rgb(0.0, 0.0, 1.0),
            },
            ColorStop {
                position: 0.0,
                color: Color::rgb(1.0, 0.0, 0.0),
            },
        ])
        .unwrap();
        let stops = g.stops();
        assert_eq!(stops[0].color.r, 1.0);
        assert_eq!(stops[1].color.b, 1.0);
    }

    #[test]
    fn test_rejects_empty_stops_on_deserialize() {
        let result: Result<ColorGradient, _> = serde_json::from_str(r#"{"stops": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn every_named_palette_resolves() {
        for name in palettes::NAMES {
            let g = palettes::by_name(name).unwrap();
            assert!(g.stops().len() >= 2, "{name}");
        }
        assert!(palettes::by_name("nope").is_none());
    }
}
