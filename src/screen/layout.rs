//! Fixed click targets of the 1920x1080 client.

use crate::screen::Region;

/// Toggle that auto-skips calls on every discard
pub const NO_CALLS_TOGGLE: Region = Region::new(14, 610, 43, 44);
/// Right part of the skip button, clear of the buttons sliding in from the left
pub const SKIP_BUTTON: Region = Region::new(1309, 811, 82, 50);

/// Idle spots away from the hand, so hovering does not pop up win hints
pub const IDLE_FOR_CHI: Region = Region::new(987, 806, 132, 57);
pub const IDLE_FOR_GANG: Region = Region::new(986, 806, 134, 57);
pub const IDLE_FOR_LIQI: Region = Region::new(976, 812, 147, 51);
pub const IDLE_FOR_ZIMOHU: Region = Region::new(966, 807, 154, 56);

pub const MAIL_ADDRESS_FIELD: Region = Region::new(480, 373, 428, 55);
pub const SEND_CODE_BUTTON: Region = Region::new(843, 495, 206, 85);
pub const AUTH_CODE_FIELD: Region = Region::new(433, 510, 288, 55);

/// Size of the area clicked to close a home notification
pub const NOTIFICATION_CLOSE_SIZE: u32 = 30;

const HAND_LEFT: f64 = 224.0;
const HAND_RIGHT: f64 = 312.0;
const TILE_PITCH: f64 = 94.91;
const HAND_TOP: u32 = 922;
const TILE_HEIGHT: u32 = 149;
/// Gap between the hand and the drawn tile
const DRAWN_TILE_GAP: u32 = 29;

/// Measured left edge and width of the drawn tile per hand size
fn drawn_tile(index: usize) -> (u32, u32) {
    match index {
        13 => (1487, 89),
        10 => (1203, 89),
        7 => (918, 89),
        4 => (633, 90),
        1 => (224, 89),
        _ => ((HAND_LEFT + index as f64 * TILE_PITCH).round() as u32 + DRAWN_TILE_GAP, 89),
    }
}

/// Clickable area of the tile at `index`; `drawn` marks the drawn tile,
/// which sits apart from the rest of the hand.
///
/// The area is shrunk so a click never lands on a neighbour.
pub fn hand_tile(index: usize, drawn: bool) -> Region {
    let tile = if drawn {
        let (left, width) = drawn_tile(index);
        Region::new(left, HAND_TOP, width, TILE_HEIGHT)
    } else {
        let offset = index as f64 * TILE_PITCH;
        let left = (HAND_LEFT + offset).round() as u32;
        let right = (HAND_RIGHT + offset).round() as u32;
        Region::new(left, HAND_TOP, right - left + 1, TILE_HEIGHT)
    };
    tile.inset(0.1, 0.1, 0.8, 0.7)
}

/// Button of alternative `index` among `count` meld choices
pub fn meld_choice(count: usize, index: usize) -> Region {
    let left = 880 - 100 * (count as u32 - 1) + 200 * index as u32;
    Region::new(left, 691, 160, 120)
}
