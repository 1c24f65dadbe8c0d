//! Domain layer of the marketplace backend.
//!
//! - [`cart`]: per-customer cart locked to a single shop
//! - [`checkout`]: cart to paid order, wallet debit and cart clear in one transaction
//! - [`order`]: order status machine, archive into shop and user history
//! - [`menu`]: shop menus and the shop price range they maintain
//! - [`wallet`], [`shop`], [`reservation`]: supporting documents
//! - [`migration`]: upgrade of legacy order documents
//!
//! Every service is generic over [`doc_store::DocumentStore`] and runs its
//! read-then-write sequences as store transactions.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod menu;
pub mod migration;
pub mod money;
pub mod order;
pub mod paths;
pub mod reservation;
pub mod shop;
pub mod wallet;

pub use cart::{
    AddToCart, Cart, CartError, CartLine, CartService, MenuItemInput, UpdateCartQuantity,
};
pub use checkout::{Checkout, CheckoutOutcome, CheckoutReceipt, CheckoutService};
pub use error::{DomainError, ErrorKind};
pub use menu::{CreateMenuItem, MenuItem, MenuService, MenuWrite, PriceRange, UpdateMenuItem};
pub use migration::{BackfillReport, backfill_orders, upgrade_order};
pub use money::Money;
pub use order::{
    CreateOrder, HistoryCursor, HistoryPage, HistoryRecord, HistoryScope, ListHistory, Order,
    OrderError, OrderLine, OrderService, OrderStatus, PaymentState, StatusUpdate,
    UpdateOrderStatus,
};
pub use reservation::{CreateReservation, Reservation, ReservationService};
pub use shop::{RegisterShop, Shop, ShopService, ShopStatus, UpdateShop};
pub use wallet::{TopUp, WalletService};
