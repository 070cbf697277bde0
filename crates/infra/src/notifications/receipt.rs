//! Receipt rendering (plain text and HTML) from a committed order snapshot.

use askama::Template;

use orderkit_orders::{Order, OrderStatus};

use super::NotificationError;

/// One printed line; amounts are pre-formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub subtotal: String,
}

#[derive(Template)]
#[template(path = "receipt.txt")]
struct ReceiptText<'a> {
    store_name: &'a str,
    order_id: &'a str,
    customer_name: &'a str,
    headline: &'a str,
    status: &'a str,
    placed_at: &'a str,
    lines: &'a [ReceiptLine],
    total: &'a str,
}

#[derive(Template)]
#[template(path = "receipt.html")]
struct ReceiptHtml<'a> {
    store_name: &'a str,
    order_id: &'a str,
    customer_name: &'a str,
    headline: &'a str,
    status: &'a str,
    placed_at: &'a str,
    lines: &'a [ReceiptLine],
    total: &'a str,
}

/// A rendered receipt, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render both receipt bodies for `order` in its current status.
pub fn render_receipt(store_name: &str, order: &Order) -> Result<Receipt, NotificationError> {
    let order_id = order.id_typed().to_string();
    let status = order.status().as_str();
    let placed_at = order.created_at().format("%Y-%m-%d %H:%M UTC").to_string();
    let total = order.total_price().to_string();
    let headline = headline(order.status());

    let mut lines = Vec::with_capacity(order.lines().len());
    for line in order.lines() {
        let subtotal = line
            .subtotal()
            .map_err(|e| NotificationError::Render(e.to_string()))?;
        lines.push(ReceiptLine {
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.price.to_string(),
            subtotal: subtotal.to_string(),
        });
    }

    let text = ReceiptText {
        store_name,
        order_id: &order_id,
        customer_name: &order.contact().name,
        headline,
        status,
        placed_at: &placed_at,
        lines: &lines,
        total: &total,
    }
    .render()?;

    let html = ReceiptHtml {
        store_name,
        order_id: &order_id,
        customer_name: &order.contact().name,
        headline,
        status,
        placed_at: &placed_at,
        lines: &lines,
        total: &total,
    }
    .render()?;

    Ok(Receipt {
        subject: format!("{store_name}: order {order_id} is {status}"),
        text,
        html,
    })
}

fn headline(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Thanks for your order. We have received it and reserved your items.",
        OrderStatus::Shipped => "Your order is on its way.",
        OrderStatus::Completed => "Your order is complete. You can now review the items you bought.",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    }
}
