//! Parameter descriptions for a host UI.
//!
//! Each knob is a [`ParamSpec`]; how its value is shown is a
//! [`DisplayFormatter`] variant rather than per-knob code.

use serde::Serialize;

use crate::dsp::envelope::knob_to_seconds;

/// How a parameter value is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayFormatter {
    /// `value` with a unit and fixed decimals.
    Plain { unit: &'static str, decimals: usize },
    /// Normalized 0..1 knob mapped exponentially onto `min..max` Hz.
    ExponentialFrequency { min: f32, max: f32 },
    /// 0..1 shown as 0..100 %.
    Percentage,
    /// Rounded index into a label table.
    SteppedEnum { labels: &'static [&'static str] },
    /// Signed clock ratio: `+n` multiplies, `-n` divides.
    DivMult,
    /// First label whose upper bound is at or above the value.
    ThresholdTable { entries: &'static [(f32, &'static str)] },
    /// Seconds, switching to milliseconds below one second.
    Time,
    /// 0..1 time knob on the six-decade envelope law, shown as a time.
    KnobSeconds,
}

impl DisplayFormatter {
    pub fn format(&self, value: f32) -> String {
        match *self {
            DisplayFormatter::Plain { unit, decimals } => {
                if unit.is_empty() {
                    format!("{value:.decimals$}")
                } else {
                    format!("{value:.decimals$} {unit}")
                }
            }
            DisplayFormatter::ExponentialFrequency { min, max } => {
                let hz = min * (max / min).powf(value.clamp(0.0, 1.0));
                format_hz(hz)
            }
            DisplayFormatter::Percentage => format!("{:.0}%", value * 100.0),
            DisplayFormatter::SteppedEnum { labels } => {
                if labels.is_empty() {
                    return String::new();
                }
                let index = (value.round().max(0.0) as usize).min(labels.len() - 1);
                labels[index].to_string()
            }
            DisplayFormatter::DivMult => {
                let v = value.round() as i32;
                match v {
                    v if v > 0 => format!("{}x", v + 1),
                    v if v < 0 => format!("1/{}x", -v + 1),
                    _ => "1x".to_string(),
                }
            }
            DisplayFormatter::ThresholdTable { entries } => entries
                .iter()
                .find(|(bound, _)| value <= *bound)
                .or(entries.last())
                .map(|(_, label)| label.to_string())
                .unwrap_or_default(),
            DisplayFormatter::Time => format_seconds(value),
            DisplayFormatter::KnobSeconds => format_seconds(knob_to_seconds(value, 0.0)),
        }
    }
}

fn format_seconds(seconds: f32) -> String {
    if seconds < 1.0 {
        format!("{:.1} ms", seconds * 1000.0)
    } else {
        format!("{seconds:.2} s")
    }
}

fn format_hz(hz: f32) -> String {
    if hz >= 1000.0 {
        format!("{:.2} kHz", hz / 1000.0)
    } else {
        format!("{hz:.1} Hz")
    }
}

/// A host-facing knob description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub formatter: DisplayFormatter,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: f32, max: f32, default: f32, formatter: DisplayFormatter) -> Self {
        ParamSpec {
            name,
            min,
            max,
            default,
            formatter,
        }
    }

    /// Plain numeric knob.
    pub const fn plain(name: &'static str, min: f32, max: f32, default: f32, unit: &'static str) -> Self {
        Self::new(name, min, max, default, DisplayFormatter::Plain { unit, decimals: 2 })
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn display(&self, value: f32) -> String {
        self.formatter.format(self.clamp(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_percentage() {
        let f = DisplayFormatter::Plain { unit: "V", decimals: 1 };
        assert_eq!(f.format(2.345), "2.3 V");
        let f = DisplayFormatter::Plain { unit: "", decimals: 0 };
        assert_eq!(f.format(16.0), "16");
        assert_eq!(DisplayFormatter::Percentage.format(0.7), "70%");
    }

    #[test]
    fn exponential_frequency() {
        let f = DisplayFormatter::ExponentialFrequency { min: 20.0, max: 20000.0 };
        assert_eq!(f.format(0.0), "20.0 Hz");
        assert_eq!(f.format(1.0), "20.00 kHz");
        // Halfway on a 1000:1 range is the geometric mean.
        assert_eq!(f.format(0.5), "632.5 Hz");
    }

    #[test]
    fn div_mult_labels() {
        let f = DisplayFormatter::DivMult;
        assert_eq!(f.format(0.0), "1x");
        assert_eq!(f.format(1.0), "2x");
        assert_eq!(f.format(3.0), "4x");
        assert_eq!(f.format(-1.0), "1/2x");
        assert_eq!(f.format(-3.0), "1/4x");
    }

    #[test]
    fn stepped_enum_clamps_index() {
        let f = DisplayFormatter::SteppedEnum {
            labels: &["Free", "1", "8"],
        };
        assert_eq!(f.format(0.2), "Free");
        assert_eq!(f.format(1.6), "8");
        assert_eq!(f.format(9.0), "8");
        assert_eq!(f.format(-2.0), "Free");
    }

    #[test]
    fn threshold_table_picks_first_bound() {
        let f = DisplayFormatter::ThresholdTable {
            entries: &[(-0.001, "Lowpass"), (0.001, "Off"), (1.0, "Highpass")],
        };
        assert_eq!(f.format(-0.5), "Lowpass");
        assert_eq!(f.format(0.0), "Off");
        assert_eq!(f.format(0.5), "Highpass");
        assert_eq!(f.format(7.0), "Highpass", "past the last bound uses the last label");
    }

    #[test]
    fn time_switches_units() {
        assert_eq!(DisplayFormatter::Time.format(0.0125), "12.5 ms");
        assert_eq!(DisplayFormatter::Time.format(2.5), "2.50 s");
        assert_eq!(DisplayFormatter::KnobSeconds.format(0.5), "1.00 s");
        assert_eq!(DisplayFormatter::KnobSeconds.format(0.0), "1.0 ms");
    }

    #[test]
    fn param_display_clamps() {
        let p = ParamSpec::new("Level", 0.0, 1.0, 0.7, DisplayFormatter::Percentage);
        assert_eq!(p.display(1.5), "100%");
        assert_eq!(p.clamp(-1.0), 0.0);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let p = ParamSpec::plain("Curve", -0.99, 0.99, 0.0, "");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""kind":"plain""#), "{json}");
        assert!(json.contains(r#""name":"Curve""#));
    }
}
