use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::state::tile::{parse_combination, Tile};

/// Wire form of a pending decision set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationListWire {
    #[serde(default)]
    pub time_fixed: u64,
    #[serde(default)]
    pub time_add: u64,
    #[serde(default)]
    pub operation_list: Vec<OperationWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationWire {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub combination: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Dapai,
    Chi,
    Peng,
    Angang,
    Daminggang,
    Jiagang,
    Liqi,
    Zimohu,
    Rong,
    Jiuzhongjiupai,
}

impl OperationKind {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Dapai,
            2 => Self::Chi,
            3 => Self::Peng,
            4 => Self::Angang,
            5 => Self::Daminggang,
            6 => Self::Jiagang,
            7 => Self::Liqi,
            8 => Self::Zimohu,
            9 => Self::Rong,
            10 => Self::Jiuzhongjiupai,
            _ => return None,
        })
    }

    /// Responses to another seat's discard
    pub fn is_call(self) -> bool {
        matches!(self, Self::Chi | Self::Peng | Self::Daminggang | Self::Rong)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dapai => "dapai",
            Self::Chi => "chi",
            Self::Peng => "peng",
            Self::Angang => "angang",
            Self::Daminggang => "daminggang",
            Self::Jiagang => "jiagang",
            Self::Liqi => "liqi",
            Self::Zimohu => "zimohu",
            Self::Rong => "rong",
            Self::Jiuzhongjiupai => "jiuzhongjiupai",
        };
        f.write_str(name)
    }
}

/// One legal response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Discard; tiles forbidden right after a call (kuikae)
    Dapai { forbidden: Vec<Tile> },
    /// Hand tiles completing each possible chi
    Chi { combinations: Vec<Vec<Tile>> },
    Peng { combinations: Vec<Vec<Tile>> },
    Angang { combinations: Vec<Vec<Tile>> },
    Daminggang { combinations: Vec<Vec<Tile>> },
    Jiagang { combinations: Vec<Vec<Tile>> },
    /// Riichi; discards that keep the hand ready
    Liqi { candidates: Vec<Tile> },
    Zimohu,
    Rong,
    Jiuzhongjiupai,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Dapai { .. } => OperationKind::Dapai,
            Self::Chi { .. } => OperationKind::Chi,
            Self::Peng { .. } => OperationKind::Peng,
            Self::Angang { .. } => OperationKind::Angang,
            Self::Daminggang { .. } => OperationKind::Daminggang,
            Self::Jiagang { .. } => OperationKind::Jiagang,
            Self::Liqi { .. } => OperationKind::Liqi,
            Self::Zimohu => OperationKind::Zimohu,
            Self::Rong => OperationKind::Rong,
            Self::Jiuzhongjiupai => OperationKind::Jiuzhongjiupai,
        }
    }

    /// Meld alternatives offered, zero for operations without a chooser
    pub fn combinations(&self) -> &[Vec<Tile>] {
        match self {
            Self::Chi { combinations }
            | Self::Peng { combinations }
            | Self::Angang { combinations }
            | Self::Daminggang { combinations }
            | Self::Jiagang { combinations } => combinations,
            _ => &[],
        }
    }

    fn from_wire(wire: &OperationWire) -> Result<Self> {
        let kind = OperationKind::from_code(wire.kind)
            .ok_or_else(|| Error::inconsistent(format!("unknown operation type {}", wire.kind)))?;
        let melds = |arity: usize| -> Result<Vec<Vec<Tile>>> {
            wire.combination
                .iter()
                .map(|c| {
                    let tiles = parse_combination(c)?;
                    if tiles.len() != arity {
                        return Err(Error::inconsistent(format!(
                            "{kind} combination `{c}` is not {arity} tiles"
                        )));
                    }
                    Ok(tiles)
                })
                .collect()
        };
        let singles = || -> Result<Vec<Tile>> {
            wire.combination.iter().map(|c| c.parse()).collect()
        };

        Ok(match kind {
            OperationKind::Dapai => Self::Dapai { forbidden: singles()? },
            OperationKind::Chi => Self::Chi { combinations: melds(2)? },
            OperationKind::Peng => Self::Peng { combinations: melds(2)? },
            OperationKind::Angang => Self::Angang { combinations: melds(4)? },
            OperationKind::Daminggang => Self::Daminggang { combinations: melds(3)? },
            OperationKind::Jiagang => Self::Jiagang { combinations: melds(4)? },
            OperationKind::Liqi => Self::Liqi { candidates: singles()? },
            OperationKind::Zimohu => Self::Zimohu,
            OperationKind::Rong => Self::Rong,
            OperationKind::Jiuzhongjiupai => Self::Jiuzhongjiupai,
        })
    }
}

/// Pending decision surface after an action that offers choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSet {
    pub basic_time: Duration,
    pub extra_time: Duration,
    operations: Vec<Operation>,
}

impl OperationSet {
    /// `None` when the wire list is absent or empty
    pub fn from_wire(wire: Option<&OperationListWire>) -> Result<Option<Self>> {
        let Some(wire) = wire.filter(|w| !w.operation_list.is_empty()) else {
            return Ok(None);
        };
        let operations = wire
            .operation_list
            .iter()
            .map(Operation::from_wire)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self {
            basic_time: Duration::from_millis(wire.time_fixed),
            extra_time: Duration::from_millis(wire.time_add),
            operations,
        }))
    }

    pub fn get(&self, kind: OperationKind) -> Option<&Operation> {
        self.operations.iter().find(|op| op.kind() == kind)
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether any choice answers another seat's discard
    pub fn has_call(&self) -> bool {
        self.operations.iter().any(|op| op.kind().is_call())
    }
}

/// The caller's answer to an [`OperationSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    /// `index` is the hand position for discards and riichi, or the
    /// combination index for calls with several alternatives
    Select { kind: OperationKind, index: Option<usize> },
}

impl Decision {
    pub fn select(kind: OperationKind) -> Self {
        Self::Select { kind, index: None }
    }

    pub fn select_at(kind: OperationKind, index: usize) -> Self {
        Self::Select { kind, index: Some(index) }
    }

    pub fn discard(index: usize) -> Self {
        Self::select_at(OperationKind::Dapai, index)
    }
}
