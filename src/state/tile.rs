use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    Man,
    Pin,
    Sou,
    Honor,
}

impl Suit {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'm' => Some(Self::Man),
            'p' => Some(Self::Pin),
            's' => Some(Self::Sou),
            'z' => Some(Self::Honor),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Man => 'm',
            Self::Pin => 'p',
            Self::Sou => 's',
            Self::Honor => 'z',
        }
    }
}

/// A tile in `<rank><suit>` notation, `0` marking a red five.
///
/// A red five is not equal to a plain five but sorts right before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tile {
    suit: Suit,
    rank: u8,
    red: bool,
}

impl Tile {
    pub fn new(suit: Suit, rank: u8) -> Option<Self> {
        let max = if suit == Suit::Honor { 7 } else { 9 };
        (1..=max).contains(&rank).then_some(Self { suit, rank, red: false })
    }

    pub fn red_five(suit: Suit) -> Option<Self> {
        (suit != Suit::Honor).then_some(Self { suit, rank: 5, red: true })
    }

    pub fn suit(&self) -> Suit {
        self.suit
    }

    /// Rank with red fives reported as 5
    pub fn rank(&self) -> u8 {
        self.rank
    }

    pub fn is_red(&self) -> bool {
        self.red
    }

    /// Equal up to the red-five marker
    pub fn same_kind(&self, other: &Tile) -> bool {
        self.suit == other.suit && self.rank == other.rank
    }

    /// The same tile without the red marker
    pub fn plain(&self) -> Tile {
        Self { red: false, ..*self }
    }

    fn sort_key(&self) -> (Suit, u8, bool) {
        (self.suit, self.rank, !self.red)
    }
}

impl Ord for Tile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Tile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::inconsistent(format!("invalid tile `{s}`"));
        let mut chars = s.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(invalid());
        };
        let suit = Suit::from_char(suit).ok_or_else(invalid)?;
        let rank = rank.to_digit(10).ok_or_else(invalid)? as u8;
        if rank == 0 {
            return Self::red_five(suit).ok_or_else(invalid);
        }
        Self::new(suit, rank).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Tile {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Tile> for String {
    fn from(tile: Tile) -> Self {
        tile.to_string()
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = if self.red { 0 } else { self.rank };
        write!(f, "{}{}", rank, self.suit.as_char())
    }
}

/// Parse `a|b|c` combination notation
pub fn parse_combination(s: &str) -> crate::error::Result<Vec<Tile>> {
    s.split('|').map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        for s in ["1m", "9p", "0s", "5s", "7z"] {
            assert_eq!(t(s).to_string(), s);
        }
        for s in ["8z", "0z", "m1", "10m", "", "5x"] {
            assert!(s.parse::<Tile>().is_err(), "{s}");
        }
    }

    #[test]
    fn test_red_five_is_distinct_but_same_kind() {
        assert_ne!(t("0m"), t("5m"));
        assert!(t("0m").same_kind(&t("5m")));
        assert!(!t("0m").same_kind(&t("5p")));
        assert_eq!(t("0p").plain(), t("5p"));
    }

    #[test]
    fn test_canonical_order() {
        let mut hand: Vec<Tile> = ["1z", "5m", "9s", "0m", "4m", "1p", "6m", "0p"]
            .iter()
            .map(|s| t(s))
            .collect();
        hand.sort();
        let sorted: Vec<String> = hand.iter().map(Tile::to_string).collect();
        assert_eq!(sorted, ["4m", "0m", "5m", "6m", "1p", "0p", "9s", "1z"]);
    }

    #[test]
    fn test_serde_as_string() {
        let tiles: Vec<Tile> = serde_json::from_str(r#"["0m","3z"]"#).unwrap();
        assert_eq!(tiles, vec![t("0m"), t("3z")]);
        assert_eq!(serde_json::to_string(&tiles).unwrap(), r#"["0m","3z"]"#);
        assert!(serde_json::from_str::<Tile>(r#""""#).is_err());
    }

    #[test]
    fn test_parse_combination() {
        assert_eq!(parse_combination("4m|0m").unwrap(), vec![t("4m"), t("0m")]);
        assert!(parse_combination("4m|").is_err());
    }
}
