//! Shopping cart domain: line items with quantities and a running total.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{Collection, DomainKind, DomainModule, Entity, parse_args};
use crate::config::DomainConfig;
use crate::core::dispatch::ToolCall;
use crate::core::handler::Reply;
use crate::core::tools::{CallError, ParamSpec, ToolRegistry, ToolSpec};

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl CartItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity: 1,
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

impl Entity for CartItem {
    fn id(&self) -> &str {
        &self.id
    }

    /// Adding an item already in the cart bumps its quantity by one.
    fn merge_on_add(&mut self, _incoming: Self) -> bool {
        self.quantity = self.quantity.saturating_add(1);
        true
    }
}

#[derive(Debug, Deserialize)]
struct AddItemArgs {
    id: String,
    item_name: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct RemoveItemArgs {
    id: String,
}

/// A JSON number as a quantity, if it is whole and within `1..=u32::MAX`.
fn whole_quantity(n: f64) -> Option<u32> {
    if n.fract() != 0.0 || n < 1.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityArgs {
    id: String,
    /// Whole number >= 1, already checked against the schema
    quantity: f64,
}

/// Console actions on the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    Remove(String),
    SetQuantity(String, u32),
    Clear,
}

/// Read-only view of the cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Collection<CartItem>,
}

impl Cart {
    pub fn new(items: impl IntoIterator<Item = CartItem>) -> Self {
        Self {
            items: Collection::from_entries(items),
        }
    }

    pub fn items(&self) -> &Collection<CartItem> {
        &self.items
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn add(&mut self, item: CartItem) {
        self.items.add(item);
    }

    pub fn remove(&mut self, id: &str) -> Option<CartItem> {
        self.items.remove(id)
    }

    /// Set the quantity of an existing item. Returns the item name, or `None`
    /// (logged) when the id is not in the cart.
    pub fn set_quantity(&mut self, id: &str, quantity: u32) -> Option<String> {
        match self.items.get_mut(id) {
            Some(item) => {
                item.quantity = quantity;
                Some(item.name.clone())
            }
            None => {
                warn!(item_id = %id, "Item not found in cart");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn summary(&self) -> String {
        if self.items.is_empty() {
            return "The cart is empty.".to_string();
        }
        let lines: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("{} x {}", item.quantity, item.name))
            .collect();
        let noun = if self.items.len() == 1 { "item" } else { "items" };
        format!(
            "The cart has {} {noun}: {}. The total is ${:.2}.",
            self.items.len(),
            lines.join(", "),
            self.total()
        )
    }
}

impl DomainModule for Cart {
    type Action = CartAction;
    type Snapshot = CartSnapshot;

    const KIND: DomainKind = DomainKind::Cart;

    fn from_config(config: &DomainConfig) -> Self {
        Cart::new(config.items.iter().flatten().cloned())
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![
            ToolSpec::new("add_item", "Add an item to the cart")
                .param(ParamSpec::string("id", "Unique ID of the item").required())
                .param(ParamSpec::string("item_name", "Name of the item").required())
                .param(
                    ParamSpec::number("price", "Unit price of the item")
                        .required()
                        .minimum(0.0),
                ),
            ToolSpec::new("remove_item", "Remove an item from the cart by its ID")
                .param(ParamSpec::string("id", "Unique ID of the item to remove").required()),
            ToolSpec::new("update_quantity", "Change the quantity of an item in the cart")
                .param(ParamSpec::string("id", "Unique ID of the item").required())
                .param(
                    ParamSpec::integer("quantity", "New quantity, at least 1")
                        .required()
                        .minimum(1.0)
                        .maximum(f64::from(u32::MAX)),
                ),
            ToolSpec::new("clear_cart", "Remove every item from the cart"),
            ToolSpec::new("get_cart", "Read the current cart contents and total"),
        ])
    }

    fn apply_call(&mut self, call: &ToolCall) -> Result<Reply, CallError> {
        match call.name.as_str() {
            "add_item" => {
                let args: AddItemArgs = parse_args(call)?;
                let narration = format!("Item \"{}\" was added to the cart.", args.item_name);
                self.add(CartItem::new(args.id, args.item_name, args.price));
                Ok(Reply::Narrate(narration))
            }
            "remove_item" => {
                let args: RemoveItemArgs = parse_args(call)?;
                self.remove(&args.id);
                Ok(Reply::Narrate("Item was removed from the cart.".to_string()))
            }
            "update_quantity" => {
                let args: UpdateQuantityArgs = parse_args(call)?;
                let quantity = whole_quantity(args.quantity).ok_or_else(|| {
                    CallError::malformed(
                        call.name.as_str(),
                        format!("quantity {} is not a whole number >= 1", args.quantity),
                    )
                })?;
                Ok(match self.set_quantity(&args.id, quantity) {
                    Some(name) => Reply::Narrate(format!(
                        "Quantity of \"{name}\" was updated to {quantity}."
                    )),
                    None => Reply::Silent,
                })
            }
            "clear_cart" => {
                self.clear();
                Ok(Reply::Narrate("The cart was cleared.".to_string()))
            }
            "get_cart" => {
                let snapshot = self.snapshot();
                Ok(Reply::Output {
                    output: json!({
                        "items": snapshot.items,
                        "total": snapshot.total,
                    }),
                    summary: self.summary(),
                })
            }
            other => Err(CallError::UnknownTool(other.to_string())),
        }
    }

    fn apply_action(&mut self, action: CartAction) {
        match action {
            CartAction::Remove(id) => {
                if self.remove(&id).is_none() {
                    warn!(item_id = %id, "Item not found in cart");
                }
            }
            CartAction::SetQuantity(id, quantity) => {
                self.set_quantity(&id, quantity);
            }
            CartAction::Clear => self.clear(),
        }
    }

    fn parse_action(verb: &str, args: &[&str]) -> Option<Result<CartAction, String>> {
        let action = match verb {
            "remove" => match args.first() {
                Some(id) => Ok(CartAction::Remove(id.to_string())),
                None => Err("usage: remove <item_id>".to_string()),
            },
            "qty" => match args {
                [id, n] => match n.parse::<u32>() {
                    Ok(quantity) if quantity >= 1 => {
                        Ok(CartAction::SetQuantity(id.to_string(), quantity))
                    }
                    _ => Err(format!("quantity must be a whole number >= 1, got '{n}'")),
                },
                _ => Err("usage: qty <item_id> <n>".to_string()),
            },
            "clear" => Ok(CartAction::Clear),
            _ => return None,
        };
        Some(action)
    }

    fn action_help() -> &'static [&'static str] {
        &[
            "qty <id> <n>  set the quantity of an item",
            "remove <id>   remove an item from the cart",
            "clear         empty the cart",
        ]
    }

    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.to_vec(),
            total: self.total(),
        }
    }

    fn render(snapshot: &CartSnapshot) -> String {
        if snapshot.items.is_empty() {
            return "No items in cart yet. Start your order by speaking!".to_string();
        }

        let mut out = String::from("Your Order\n");
        for item in &snapshot.items {
            out.push_str(&format!(
                "  [{}] {} x{}  ${:.2}\n",
                item.id,
                item.name,
                item.quantity,
                item.subtotal()
            ));
        }
        out.push_str(&format!("Total: ${:.2}", snapshot.total));
        out
    }
}
