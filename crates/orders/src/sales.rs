//! Daily sales aggregation over placed orders.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orderkit_core::{DomainError, DomainResult, Money};

use crate::order::Order;

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation("startDate must not be after endDate"));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> DomainResult<Self> {
        Self::new(parse_day(start, "startDate")?, parse_day(end, "endDate")?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

fn parse_day(value: &str, field: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("{field} must be YYYY-MM-DD")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total_sales: Money,
    pub order_count: u64,
}

/// Sum `total_price` per UTC day for orders created inside `range`.
///
/// Days without orders are omitted; output is ascending by date.
pub fn daily_sales<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    range: DateRange,
) -> DomainResult<Vec<DailySales>> {
    let mut by_day: BTreeMap<NaiveDate, (Money, u64)> = BTreeMap::new();

    for order in orders {
        let day = order.created_at().date_naive();
        if !range.contains(day) {
            continue;
        }
        let entry = by_day.entry(day).or_insert((Money::ZERO, 0));
        entry.0 = entry.0.plus(order.total_price())?;
        entry.1 += 1;
    }

    Ok(by_day
        .into_iter()
        .map(|(date, (total_sales, order_count))| DailySales {
            date,
            total_sales,
            order_count,
        })
        .collect())
}
