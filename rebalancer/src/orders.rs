//! FIFO order queue with quantity-capped retry.
//!
//! Orders wait in the queue until [`OrderManager::execute`] drains it. When
//! the broker rejects an order but names a smaller quantity it would accept,
//! a replacement for exactly that quantity goes to the back of the queue.

use std::collections::VecDeque;
use std::fmt;

use log::{error, info, warn};
use serde::Serialize;
use tangent::Symbol;
use tangent_broker::{BrokerError, Brokerage, OrderResult, Side};

/// An order waiting to be submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "side", rename_all = "lowercase")]
pub enum Order {
    Buy {
        symbol: Symbol,
        quantity: u64,
        limit_price: f64,
    },
    Sell {
        symbol: Symbol,
        quantity: u64,
        stop_price: Option<f64>,
    },
}

impl Order {
    pub fn symbol(&self) -> Symbol {
        match self {
            Order::Buy { symbol, .. } | Order::Sell { symbol, .. } => *symbol,
        }
    }

    pub fn quantity(&self) -> u64 {
        match self {
            Order::Buy { quantity, .. } | Order::Sell { quantity, .. } => *quantity,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Order::Buy { .. } => Side::Buy,
            Order::Sell { .. } => Side::Sell,
        }
    }

    /// Same order for a different quantity.
    pub fn with_quantity(&self, quantity: u64) -> Order {
        let mut order = self.clone();
        match &mut order {
            Order::Buy { quantity: q, .. } | Order::Sell { quantity: q, .. } => *q = quantity,
        }
        order
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Buy {
                symbol,
                quantity,
                limit_price,
            } => write!(f, "Buying {symbol}: {quantity} @ {limit_price:.2}"),
            Order::Sell {
                symbol,
                quantity,
                stop_price: Some(stop),
            } => write!(f, "Selling {symbol}: {quantity} @ stop {stop:.2}"),
            Order::Sell {
                symbol, quantity, ..
            } => write!(f, "Selling {symbol}: {quantity} @ market"),
        }
    }
}

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum OrderState {
    /// Accepted; `broker_state` is what the broker reported.
    Filled {
        order_id: String,
        broker_state: String,
    },
    /// Rejected with a smaller acceptable quantity; a replacement was queued.
    Retried { max_quantity: u64 },
    /// Rejected outright. Not retried.
    Failed { reason: String },
}

/// One submission and how it ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub order: Order,
    pub outcome: OrderState,
}

/// Every attempt made while draining a queue, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub attempts: Vec<Attempt>,
}

impl ExecutionReport {
    pub fn filled(&self) -> usize {
        self.count(|s| matches!(s, OrderState::Filled { .. }))
    }

    pub fn retried(&self) -> usize {
        self.count(|s| matches!(s, OrderState::Retried { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OrderState::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&OrderState) -> bool) -> usize {
        self.attempts.iter().filter(|a| pred(&a.outcome)).count()
    }
}

/// The broker became unreachable partway through a queue.
///
/// `report` holds every attempt that completed before the failure. The broker
/// may or may not have received `in_flight`, so it is not queued again.
#[derive(Debug, thiserror::Error)]
#[error("transport error while submitting {in_flight}: {source}")]
pub struct SubmitError {
    pub report: ExecutionReport,
    pub in_flight: Order,
    #[source]
    pub source: BrokerError,
}

/// Sequential order executor over a [`Brokerage`].
pub struct OrderManager<'a> {
    broker: &'a dyn Brokerage,
    queue: VecDeque<Order>,
}

impl<'a> OrderManager<'a> {
    pub fn new(broker: &'a dyn Brokerage) -> Self {
        Self {
            broker,
            queue: VecDeque::new(),
        }
    }

    /// Queue a limit buy.
    pub fn buy(&mut self, symbol: Symbol, quantity: u64, limit_price: f64) {
        self.push(Order::Buy {
            symbol,
            quantity,
            limit_price,
        });
    }

    /// Queue a sell; market unless `stop_price` is set.
    pub fn sell(&mut self, symbol: Symbol, quantity: u64, stop_price: Option<f64>) {
        self.push(Order::Sell {
            symbol,
            quantity,
            stop_price,
        });
    }

    pub fn push(&mut self, order: Order) {
        self.queue.push_back(order);
    }

    /// Orders still waiting, front first.
    pub fn pending(&self) -> &VecDeque<Order> {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Submit queued orders one at a time until the queue is empty.
    ///
    /// Every retry strictly lowers the quantity, so the queue always drains.
    /// A transport error stops execution with the attempts made so far.
    /// Orders not yet submitted stay queued.
    pub fn execute(&mut self) -> Result<ExecutionReport, SubmitError> {
        let mut report = ExecutionReport::default();

        while let Some(order) = self.queue.pop_front() {
            info!("  {order}");
            let result = match &order {
                Order::Buy {
                    symbol,
                    quantity,
                    limit_price,
                } => self.broker.buy(*symbol, *quantity, *limit_price),
                Order::Sell {
                    symbol,
                    quantity,
                    stop_price,
                } => self.broker.sell(*symbol, *quantity, *stop_price),
            };
            let result = match result {
                Ok(r) => r,
                Err(source) => {
                    error!("Lost the broker while submitting {order}: {source}");
                    return Err(SubmitError {
                        report,
                        in_flight: order,
                        source,
                    });
                }
            };

            let outcome = match result {
                OrderResult::Accepted { order_id, state } => {
                    info!("    Ok! Order is {state}");
                    OrderState::Filled {
                        order_id,
                        broker_state: state,
                    }
                }
                OrderResult::Rejected {
                    max_quantity: Some(max),
                    ..
                } if max > 0 && max < order.quantity() => {
                    warn!(
                        "    May only {} {max} shares of {}",
                        order.side(),
                        order.symbol()
                    );
                    self.queue.push_back(order.with_quantity(max));
                    OrderState::Retried { max_quantity: max }
                }
                OrderResult::Rejected { reason, .. } => {
                    error!("Unexpected order error for {}: {reason}", order.symbol());
                    OrderState::Failed { reason }
                }
            };

            report.attempts.push(Attempt { order, outcome });
        }

        Ok(report)
    }
}
