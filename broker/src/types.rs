//! Shared broker types: order results and instrument references.

use std::fmt;

use tangent::Symbol;
use uuid::Uuid;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Outcome of a single order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderResult {
    /// The broker took the order; `state` is its reported lifecycle state
    /// (e.g. "queued", "confirmed", "filled").
    Accepted { order_id: String, state: String },
    /// The broker refused the order. `max_quantity` carries the largest
    /// quantity the broker said it would accept, when it said so.
    Rejected {
        reason: String,
        max_quantity: Option<u64>,
    },
}

impl OrderResult {
    pub fn accepted(order_id: impl Into<String>, state: impl Into<String>) -> Self {
        OrderResult::Accepted {
            order_id: order_id.into(),
            state: state.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        OrderResult::Rejected {
            reason: reason.into(),
            max_quantity: None,
        }
    }

    /// Rejection that names the largest acceptable quantity.
    pub fn capped(reason: impl Into<String>, max_quantity: u64) -> Self {
        OrderResult::Rejected {
            reason: reason.into(),
            max_quantity: Some(max_quantity),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderResult::Accepted { .. })
    }
}

/// An instrument named either by broker id or by ticker.
///
/// Brokers hand back instruments as ids, full resource URLs, or tickers;
/// [`InstrumentRef::parse`] resolves any of these once at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentRef {
    Identified(Uuid),
    Symbol(Symbol),
}

impl InstrumentRef {
    /// Resolve a free-form string.
    ///
    /// The last path segment that is a hyphenated UUID wins, so both
    /// `"450dfc6d-5510-4d40-abfb-f633b7d9be3e"` and
    /// `"https://host/instruments/450dfc6d-5510-4d40-abfb-f633b7d9be3e/"`
    /// become [`InstrumentRef::Identified`]. Anything else is treated as a
    /// ticker and must fit in a [`Symbol`]; `None` otherwise.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let id = s
            .rsplit(|c: char| c == '/' || c == '?' || c == '=' || c == '&')
            .filter(|seg| seg.len() == 36)
            .find_map(|seg| Uuid::parse_str(seg).ok());
        if let Some(id) = id {
            return Some(InstrumentRef::Identified(id));
        }
        if s.is_empty() || s.contains('/') {
            return None;
        }
        Symbol::try_new(&s.to_ascii_uppercase()).map(InstrumentRef::Symbol)
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            InstrumentRef::Identified(id) => Some(*id),
            InstrumentRef::Symbol(_) => None,
        }
    }
}

impl From<Symbol> for InstrumentRef {
    fn from(symbol: Symbol) -> Self {
        InstrumentRef::Symbol(symbol)
    }
}

impl fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentRef::Identified(id) => write!(f, "{id}"),
            InstrumentRef::Symbol(sym) => write!(f, "{sym}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "450dfc6d-5510-4d40-abfb-f633b7d9be3e";

    #[test]
    fn parse_bare_uuid() {
        let r = InstrumentRef::parse(ID).unwrap();
        assert_eq!(r.id().unwrap().to_string(), ID);
    }

    #[test]
    fn parse_instrument_url() {
        let url = format!("https://api.robinhood.com/instruments/{ID}/");
        assert_eq!(
            InstrumentRef::parse(&url),
            Some(InstrumentRef::Identified(Uuid::parse_str(ID).unwrap()))
        );
    }

    #[test]
    fn last_uuid_in_path_wins() {
        let other = "11111111-2222-4333-8444-555555555555";
        let url = format!("https://host/watchlists/{other}/instruments/{ID}/");
        assert_eq!(InstrumentRef::parse(&url).unwrap().to_string(), ID);
    }

    #[test]
    fn parse_ticker() {
        assert_eq!(
            InstrumentRef::parse("spy"),
            Some(InstrumentRef::Symbol(Symbol::new("SPY")))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(InstrumentRef::parse(""), None);
        assert_eq!(InstrumentRef::parse("https://host/instruments/"), None);
        assert_eq!(InstrumentRef::parse("WAYTOOLONGTICKER"), None);
    }

    #[test]
    fn order_result_constructors() {
        assert!(OrderResult::accepted("1", "queued").is_accepted());
        assert_eq!(
            OrderResult::capped("too many", 40),
            OrderResult::Rejected {
                reason: "too many".into(),
                max_quantity: Some(40)
            }
        );
        assert!(!OrderResult::rejected("nope").is_accepted());
    }
}
