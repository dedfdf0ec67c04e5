//! Player orders dispatched to the current selection.
//!
//! Orders arrive either as a typed [`Order`] or as a loose
//! ([`OrderKind`], [`OrderPayload`]) pair from input bindings. The loose form
//! is validated once by [`Order::from_parts`]; a payload that does not fit the
//! kind yields no order at all.

use serde::{Deserialize, Serialize};

use crate::math::Vec3Fixed;
use crate::unit::UnitId;

/// A validated order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Walk to a world point.
    Move(Vec3Fixed),
    /// Strike a specific unit once and switch to attacking.
    Attack(UnitId),
    /// Hold position and fire on anything in range.
    Defend,
    /// Trigger each selected unit's special ability.
    Special,
}

/// Order type without its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// See [`Order::Move`].
    Move,
    /// See [`Order::Attack`].
    Attack,
    /// See [`Order::Defend`].
    Defend,
    /// See [`Order::Special`].
    Special,
}

/// Untyped order argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderPayload {
    /// No argument.
    #[default]
    None,
    /// A world point.
    Point(Vec3Fixed),
    /// A unit handle.
    Unit(UnitId),
}

impl Order {
    /// Combine a kind and payload into an order.
    ///
    /// `Move` needs a point and `Attack` needs a unit; `Defend` and
    /// `Special` ignore whatever payload they are given.
    #[must_use]
    pub fn from_parts(kind: OrderKind, payload: OrderPayload) -> Option<Self> {
        match (kind, payload) {
            (OrderKind::Move, OrderPayload::Point(point)) => Some(Self::Move(point)),
            (OrderKind::Attack, OrderPayload::Unit(target)) => Some(Self::Attack(target)),
            (OrderKind::Defend, _) => Some(Self::Defend),
            (OrderKind::Special, _) => Some(Self::Special),
            _ => None,
        }
    }

    /// The order's kind.
    #[must_use]
    pub const fn kind(&self) -> OrderKind {
        match self {
            Self::Move(_) => OrderKind::Move,
            Self::Attack(_) => OrderKind::Attack,
            Self::Defend => OrderKind::Defend,
            Self::Special => OrderKind::Special,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_payloads_build_orders() {
        let point = Vec3Fixed::from_ints(10, 0, 10);
        assert_eq!(
            Order::from_parts(OrderKind::Move, OrderPayload::Point(point)),
            Some(Order::Move(point))
        );
        assert_eq!(
            Order::from_parts(OrderKind::Attack, OrderPayload::Unit(UnitId::new(3))),
            Some(Order::Attack(UnitId::new(3)))
        );
    }

    #[test]
    fn test_mismatched_payloads_are_rejected() {
        assert_eq!(Order::from_parts(OrderKind::Move, OrderPayload::None), None);
        assert_eq!(
            Order::from_parts(OrderKind::Move, OrderPayload::Unit(UnitId::new(1))),
            None
        );
        assert_eq!(
            Order::from_parts(OrderKind::Attack, OrderPayload::Point(Vec3Fixed::ZERO)),
            None
        );
    }

    #[test]
    fn test_payloadless_orders_ignore_payload() {
        assert_eq!(
            Order::from_parts(OrderKind::Defend, OrderPayload::Point(Vec3Fixed::ZERO)),
            Some(Order::Defend)
        );
        assert_eq!(
            Order::from_parts(OrderKind::Special, OrderPayload::None),
            Some(Order::Special)
        );
    }

    #[test]
    fn test_kind_roundtrip() {
        for order in [
            Order::Move(Vec3Fixed::ZERO),
            Order::Attack(UnitId::new(0)),
            Order::Defend,
            Order::Special,
        ] {
            let payload = match order {
                Order::Move(p) => OrderPayload::Point(p),
                Order::Attack(t) => OrderPayload::Unit(t),
                _ => OrderPayload::None,
            };
            assert_eq!(Order::from_parts(order.kind(), payload), Some(order));
        }
    }
}
