//! Connection / speaking indicator, recomputed from scratch on every status change

use rand::Rng;
use serde::Serialize;

pub const BAR_COUNT: usize = 5;
pub const OFFLINE_LABEL: &str = "Agent Offline";

/// Height of a bar at rest
const RESTING_HEIGHT_PX: f32 = 4.0;
/// Speaking bars pick a height in [MIN, MIN + SPREAD)
const SPEAKING_MIN_HEIGHT_PX: f32 = 12.0;
const SPEAKING_SPREAD_PX: f32 = 24.0;
const BAR_STAGGER_S: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub height_px: f32,
    pub opacity: f32,
    /// Animation offset so the bars do not pulse in lockstep
    pub delay_s: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndicatorView {
    Offline { label: &'static str },
    Live { bars: [Bar; BAR_COUNT], glow: bool },
}

pub fn render(is_active: bool, is_speaking: bool) -> IndicatorView {
    if !is_active {
        return IndicatorView::Offline {
            label: OFFLINE_LABEL,
        };
    }

    let mut rng = rand::thread_rng();
    let bars = std::array::from_fn(|i| Bar {
        height_px: if is_speaking {
            SPEAKING_MIN_HEIGHT_PX + rng.gen::<f32>() * SPEAKING_SPREAD_PX
        } else {
            RESTING_HEIGHT_PX
        },
        opacity: if is_speaking { 1.0 } else { 0.5 },
        delay_s: i as f32 * BAR_STAGGER_S,
    });

    IndicatorView::Live {
        bars,
        glow: is_speaking,
    }
}

impl IndicatorView {
    /// One-line terminal rendering
    pub fn to_line(&self) -> String {
        const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

        match self {
            IndicatorView::Offline { label } => format!("[ {} ]", label),
            IndicatorView::Live { bars, glow } => {
                let max = SPEAKING_MIN_HEIGHT_PX + SPEAKING_SPREAD_PX;
                let body: String = bars
                    .iter()
                    .map(|bar| {
                        let idx = ((bar.height_px / max) * LEVELS.len() as f32) as usize;
                        LEVELS[idx.min(LEVELS.len() - 1)]
                    })
                    .collect();
                if *glow {
                    format!("[*{}*]", body)
                } else {
                    format!("[ {} ]", body)
                }
            }
        }
    }
}
