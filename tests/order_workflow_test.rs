mod common;

use assert_matches::assert_matches;
use common::{capture, TestApp};
use proptest::prelude::*;
use sea_orm::{EntityTrait, PaginatorTrait};

use storefront_api::{
    auth::RequestContext,
    entities::{Cart, Order, OrderItem, Product},
    errors::ServiceError,
    events::Event,
    models::{PaymentMethod, Role},
    services::{CartOwner, CheckoutBlocker, CheckoutOutcome},
};

fn placed(outcome: CheckoutOutcome) -> uuid::Uuid {
    match outcome {
        CheckoutOutcome::Placed {
            order_id,
            redirect_to,
        } => {
            assert_eq!(redirect_to, format!("/order/{}", order_id));
            order_id
        }
        CheckoutOutcome::Blocked(blocker) => panic!("checkout blocked: {:?}", blocker),
    }
}

#[tokio::test]
async fn cart_to_paid_order() {
    let mut app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;

    let cart = services.carts.add_item(&ctx, p1.id, 2).await.unwrap();
    assert_eq!(cart.items_price, "20.00");
    assert_eq!(cart.tax_price, "1.20");
    assert_eq!(cart.shipping_price, "5.00");
    assert_eq!(cart.total_price, "26.20");

    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());

    let details = services.orders.get_order(&ctx, order_id).await.unwrap();
    assert_eq!(details.order.total_price, "26.20");
    assert_eq!(details.order.items_price, "20.00");
    assert_eq!(details.order.payment_method, PaymentMethod::PayPal);
    assert!(!details.order.is_paid);
    assert_eq!(details.order_items.len(), 1);
    assert_eq!(details.order_items[0].qty, 2);
    assert_eq!(details.order_items[0].price, "10.00");
    assert_eq!(details.user.name, "Juan Dela Cruz");

    let cart = services
        .carts
        .get_active_cart(&CartOwner::User(shopper.id))
        .await
        .unwrap()
        .expect("cart survives checkout");
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_price, "0.00");
    // Checkout does not touch stock.
    assert_eq!(app.stock_of(p1.id).await, 5);

    let payment = services
        .payments
        .create_payment_order(&ctx, order_id)
        .await
        .unwrap();
    assert_eq!(payment.provider_order_id, "PAY1");

    app.gateway
        .respond_with(Some(capture("PAY1", "COMPLETED", "26.20")));
    let paid = services
        .payments
        .capture_payment(&ctx, order_id, "PAY1")
        .await
        .unwrap();
    assert!(paid.order.is_paid);
    assert!(paid.order.paid_at.is_some());
    let receipt = paid.order.payment_result.expect("receipt stored");
    assert_eq!(receipt.id, "PAY1");
    assert_eq!(receipt.status, "COMPLETED");
    assert_eq!(receipt.email_address, "buyer@example.com");
    assert_eq!(receipt.price_paid, "26.20");
    assert_eq!(app.stock_of(p1.id).await, 3);

    // A replayed capture changes nothing.
    let again = services
        .payments
        .capture_payment(&ctx, order_id, "PAY1")
        .await;
    assert_matches!(again, Err(ServiceError::AlreadyPaid(id)) if id == order_id);
    assert_eq!(app.stock_of(p1.id).await, 3);

    let events = app.drain_events();
    assert!(events.contains(&Event::OrderCreated(order_id)));
    assert!(events.contains(&Event::CartCleared(cart.id)));
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == Event::OrderPaid(order_id))
            .count(),
        1
    );
}

#[tokio::test]
async fn checkout_blockers_are_reported_in_order() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let p1 = app.seed_product("10.00", 5).await;

    // Nothing set up: the empty cart is reported first.
    let bare = app.seed_user("Maria Clara", Role::User, None, None).await;
    let ctx = TestApp::ctx(&bare);
    assert_eq!(
        services.checkout.create_order(&ctx).await.unwrap(),
        CheckoutOutcome::Blocked(CheckoutBlocker::EmptyCart)
    );

    app.seed_cart(bare.id, &[(&p1, 1)]).await;
    assert_eq!(
        services.checkout.create_order(&ctx).await.unwrap(),
        CheckoutOutcome::Blocked(CheckoutBlocker::NoShippingAddress)
    );

    services
        .accounts
        .update_address(&ctx, common::address())
        .await
        .unwrap();
    assert_eq!(
        services.checkout.create_order(&ctx).await.unwrap(),
        CheckoutOutcome::Blocked(CheckoutBlocker::NoPaymentMethod)
    );

    services
        .accounts
        .update_payment_method(&ctx, "PayPal")
        .await
        .unwrap();
    placed(services.checkout.create_order(&ctx).await.unwrap());
}

#[tokio::test]
async fn checkout_requires_a_signed_in_user() {
    let app = TestApp::new().await;
    let ctx = RequestContext::anonymous("session-1");
    assert_matches!(
        app.state.services.checkout.create_order(&ctx).await,
        Err(ServiceError::Unauthenticated)
    );
}

#[tokio::test]
async fn failed_checkout_leaves_no_partial_order() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let kept = app.seed_product("10.00", 5).await;
    let gone = app.seed_product("4.00", 5).await;
    let cart_id = app.seed_cart(shopper.id, &[(&kept, 1), (&gone, 1)]).await;

    // The second line no longer references a product, so its item insert fails.
    Product::delete_by_id(gone.id).exec(app.db()).await.unwrap();

    let result = services.checkout.create_order(&ctx).await;
    assert_matches!(result, Err(ServiceError::DatabaseError(_)));

    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(app.db()).await.unwrap(), 0);
    let cart = Cart::find_by_id(cart_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items_price, "14.00");
}

#[tokio::test]
async fn capture_is_rejected_without_a_body() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());
    services
        .payments
        .create_payment_order(&ctx, order_id)
        .await
        .unwrap();

    app.gateway.respond_with(None);
    assert_matches!(
        services.payments.capture_payment(&ctx, order_id, "PAY1").await,
        Err(ServiceError::PaymentValidationFailed(_))
    );
    assert_eq!(app.stock_of(p1.id).await, 5);
}

#[tokio::test]
async fn capture_is_rejected_for_another_remote_order() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());
    services
        .payments
        .create_payment_order(&ctx, order_id)
        .await
        .unwrap();

    app.gateway
        .respond_with(Some(capture("OTHER", "COMPLETED", "15.60")));
    assert_matches!(
        services.payments.capture_payment(&ctx, order_id, "OTHER").await,
        Err(ServiceError::PaymentValidationFailed(_))
    );

    let order = Order::find_by_id(order_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert!(!order.is_paid);
    assert_eq!(order.payment_result.unwrap().id, "PAY1");
}

#[tokio::test]
async fn capture_is_rejected_until_completed() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());
    services
        .payments
        .create_payment_order(&ctx, order_id)
        .await
        .unwrap();

    app.gateway
        .respond_with(Some(capture("PAY1", "PENDING", "15.60")));
    assert_matches!(
        services.payments.capture_payment(&ctx, order_id, "PAY1").await,
        Err(ServiceError::PaymentValidationFailed(_))
    );
    assert_eq!(app.stock_of(p1.id).await, 5);
}

#[tokio::test]
async fn capture_without_payment_order_is_rejected() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());

    app.gateway
        .respond_with(Some(capture("PAY1", "COMPLETED", "15.60")));
    assert_matches!(
        services.payments.capture_payment(&ctx, order_id, "PAY1").await,
        Err(ServiceError::PaymentValidationFailed(_))
    );
}

#[tokio::test]
async fn concurrent_pay_transitions_settle_once() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let shopper = app.seed_shopper().await;
    let ctx = TestApp::ctx(&shopper);
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 2)]).await;
    let order_id = placed(services.checkout.create_order(&ctx).await.unwrap());

    let (first, second) = tokio::join!(
        services.orders.pay_transition(order_id, None),
        services.orders.pay_transition(order_id, None),
    );
    let settled = [first.is_ok(), second.is_ok()];
    assert_eq!(settled.iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(first, Err(ServiceError::AlreadyPaid(_))) || matches!(second, Err(ServiceError::AlreadyPaid(_))));
    assert_eq!(app.stock_of(p1.id).await, 3);
}

#[tokio::test]
async fn other_shoppers_cannot_pay_or_view_an_order() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let owner = app.seed_shopper().await;
    let stranger = app.seed_shopper().await;
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(owner.id, &[(&p1, 1)]).await;
    let order_id = placed(
        services
            .checkout
            .create_order(&TestApp::ctx(&owner))
            .await
            .unwrap(),
    );

    let ctx = TestApp::ctx(&stranger);
    assert_matches!(
        services.orders.get_order(&ctx, order_id).await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        services.payments.create_payment_order(&ctx, order_id).await,
        Err(ServiceError::Unauthorized(_))
    );
}

#[tokio::test]
async fn admin_settles_cash_on_delivery_and_delivers() {
    let mut app = TestApp::new().await;
    let services = app.state.services.clone();
    let admin = app.seed_user("Admin", Role::Admin, None, None).await;
    let admin_ctx = TestApp::ctx(&admin);
    let shopper = app
        .seed_user(
            "Jose Rizal",
            Role::User,
            Some(common::address()),
            Some(PaymentMethod::CashOnDelivery),
        )
        .await;
    let p1 = app.seed_product("25.00", 4).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(
        services
            .checkout
            .create_order(&TestApp::ctx(&shopper))
            .await
            .unwrap(),
    );

    // Not paid yet, so delivery is refused.
    let refused = services.orders.mark_delivered(&admin_ctx, order_id).await;
    assert_matches!(
        refused,
        Err(ServiceError::PreconditionNotMet { ref redirect_to, .. })
            if *redirect_to == format!("/order/{}", order_id)
    );

    assert_matches!(
        services
            .orders
            .mark_paid_cash_on_delivery(&TestApp::ctx(&shopper), order_id)
            .await,
        Err(ServiceError::Unauthorized(_))
    );

    let paid = services
        .orders
        .mark_paid_cash_on_delivery(&admin_ctx, order_id)
        .await
        .unwrap();
    assert!(paid.order.is_paid);
    assert!(paid.order.payment_result.is_none());
    assert_eq!(app.stock_of(p1.id).await, 3);

    let delivered = services
        .orders
        .mark_delivered(&admin_ctx, order_id)
        .await
        .unwrap();
    assert!(delivered.order.is_delivered);
    assert!(delivered.order.delivered_at.is_some());
    assert_matches!(
        services.orders.mark_delivered(&admin_ctx, order_id).await,
        Err(ServiceError::InvalidOperation(_))
    );

    let events = app.drain_events();
    assert!(events.contains(&Event::OrderDelivered(order_id)));
}

#[tokio::test]
async fn cash_on_delivery_is_only_for_cod_orders() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let admin = app.seed_user("Admin", Role::Admin, None, None).await;
    let shopper = app.seed_shopper().await;
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(
        services
            .checkout
            .create_order(&TestApp::ctx(&shopper))
            .await
            .unwrap(),
    );

    assert_matches!(
        services
            .orders
            .mark_paid_cash_on_delivery(&TestApp::ctx(&admin), order_id)
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn admin_deletes_orders_with_their_items() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let admin = app.seed_user("Admin", Role::Admin, None, None).await;
    let shopper = app.seed_shopper().await;
    let p1 = app.seed_product("10.00", 5).await;
    app.seed_cart(shopper.id, &[(&p1, 1)]).await;
    let order_id = placed(
        services
            .checkout
            .create_order(&TestApp::ctx(&shopper))
            .await
            .unwrap(),
    );

    assert_matches!(
        services
            .orders
            .delete_order(&TestApp::ctx(&shopper), order_id)
            .await,
        Err(ServiceError::Unauthorized(_))
    );

    services
        .orders
        .delete_order(&TestApp::ctx(&admin), order_id)
        .await
        .unwrap();
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(app.db()).await.unwrap(), 0);

    assert_matches!(
        services
            .orders
            .delete_order(&TestApp::ctx(&admin), order_id)
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn order_listings_page_and_filter() {
    let app = TestApp::new().await;
    let services = app.state.services.clone();
    let admin = app.seed_user("Admin", Role::Admin, None, None).await;
    let juan = app.seed_shopper().await;
    let maria = app
        .seed_user(
            "Maria Clara",
            Role::User,
            Some(common::address()),
            Some(PaymentMethod::PayPal),
        )
        .await;
    let p1 = app.seed_product("10.00", 50).await;

    for shopper in [&juan, &juan, &juan, &maria] {
        app.seed_cart(shopper.id, &[(&p1, 1)]).await;
        placed(
            services
                .checkout
                .create_order(&TestApp::ctx(shopper))
                .await
                .unwrap(),
        );
    }

    let mine = services
        .orders
        .my_orders(&TestApp::ctx(&juan), 2)
        .await
        .unwrap();
    assert_eq!(mine.total, 3);
    assert_eq!(mine.total_pages, 2);
    assert_eq!(mine.data.len(), 1);

    let admin_ctx = TestApp::ctx(&admin);
    let all = services.orders.all_orders(&admin_ctx, None, 1).await.unwrap();
    assert_eq!(all.total, 4);

    let filtered = services
        .orders
        .all_orders(&admin_ctx, Some("mARIA"), 1)
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.data[0].user_id, maria.id);

    assert_matches!(
        services.orders.all_orders(&TestApp::ctx(&juan), None, 1).await,
        Err(ServiceError::Unauthorized(_))
    );

    let summary = services.orders.sales_summary(&admin_ctx).await.unwrap();
    assert_eq!(summary.orders_count, 4);
    assert_eq!(summary.users_count, 3);
    // 10.00 + 0.60 tax + 5.00 shipping per order
    assert_eq!(summary.total_sales, "62.40");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn paying_takes_exactly_the_ordered_quantity(stock in 0i32..20, qty in 0i32..30) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let remaining = runtime.block_on(async {
            let app = TestApp::new().await;
            let services = app.state.services.clone();
            let shopper = app.seed_shopper().await;
            let p1 = app.seed_product("3.00", stock).await;
            app.seed_cart(shopper.id, &[(&p1, qty)]).await;
            let order_id = placed(
                services
                    .checkout
                    .create_order(&TestApp::ctx(&shopper))
                    .await
                    .unwrap(),
            );
            services.orders.pay_transition(order_id, None).await.unwrap();
            let second = services.orders.pay_transition(order_id, None).await;
            assert!(matches!(second, Err(ServiceError::AlreadyPaid(_))));
            app.stock_of(p1.id).await
        });
        prop_assert_eq!(remaining, stock - qty);
    }
}
