//! Visual state ↔ cell style. Presentation only; values are never touched.

use capsync_engine::cell::{CellStyle, Rgb};
use capsync_engine::sheet::Sheet;

use crate::model::VisualState;

pub const UPDATED: CellStyle = CellStyle {
    fill: Some(Rgb(0x7fffd4)),
    font_color: Some(Rgb(0x555555)),
};

pub const RESET: CellStyle = CellStyle {
    fill: None,
    font_color: Some(Rgb(0x2e2e2e)),
};

pub const STALE_PAST: CellStyle = CellStyle {
    fill: Some(Rgb(0xb22222)),
    font_color: Some(Rgb(0xffffff)),
};

pub fn style_for(state: VisualState) -> CellStyle {
    match state {
        VisualState::Updated => UPDATED,
        VisualState::Reset => RESET,
        VisualState::StalePast => STALE_PAST,
        VisualState::None => CellStyle::default(),
    }
}

/// Inverse of `style_for`; any other style reads as `None`.
pub fn state_of(style: CellStyle) -> VisualState {
    match style {
        s if s == UPDATED => VisualState::Updated,
        s if s == RESET => VisualState::Reset,
        s if s == STALE_PAST => VisualState::StalePast,
        _ => VisualState::None,
    }
}

pub fn apply(sheet: &mut Sheet, row: usize, col: usize, state: VisualState) {
    sheet.set_style(row, col, style_for(state));
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsync_engine::cell::CellValue;

    #[test]
    fn every_state_round_trips() {
        for state in [
            VisualState::Updated,
            VisualState::Reset,
            VisualState::StalePast,
            VisualState::None,
        ] {
            assert_eq!(state_of(style_for(state)), state);
        }
    }

    #[test]
    fn apply_leaves_value_alone() {
        let mut sheet = Sheet::new("S");
        sheet.set_value(2, 3, CellValue::from("Closed"));
        apply(&mut sheet, 2, 3, VisualState::StalePast);
        assert_eq!(sheet.value(2, 3), &CellValue::from("Closed"));
        assert_eq!(sheet.style(2, 3), STALE_PAST);
    }
}
