use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use vitafit::models::{price_order, PricedLine, SHIPPING_FEE};

fn line(price: Decimal, sale_price: Option<Decimal>, quantity: i32) -> PricedLine {
    PricedLine {
        product_id: Uuid::new_v4(),
        product_name: "Resistance Band Set".to_string(),
        unit_price: price,
        sale_price,
        quantity,
    }
}

#[test]
fn test_small_order_pays_shipping() {
    let totals = price_order(&[line(dec!(89.00), Some(dec!(69.00)), 1)]);

    assert_eq!(totals.subtotal, dec!(89.00));
    assert_eq!(totals.discount, dec!(20.00));
    assert_eq!(totals.tax, dec!(3.45));
    assert_eq!(totals.shipping, SHIPPING_FEE);
    assert_eq!(totals.total, dec!(87.45));
    assert!(totals.is_consistent());
}

#[test]
fn test_free_shipping_uses_discounted_amount() {
    // 2 x 119 = 238 after sale, over the threshold
    let totals = price_order(&[line(dec!(150.00), Some(dec!(119.00)), 2)]);
    assert_eq!(totals.shipping, Decimal::ZERO);

    // 210 list, but only 190 after an order-level sale
    let totals = price_order(&[line(dec!(210.00), Some(dec!(190.00)), 1)]);
    assert_eq!(totals.shipping, SHIPPING_FEE);
}

#[test]
fn test_sale_price_above_list_is_ignored() {
    let totals = price_order(&[line(dec!(120.00), Some(dec!(130.00)), 1)]);
    assert_eq!(totals.discount, Decimal::ZERO);
}

proptest! {
    #[test]
    fn prop_totals_are_always_consistent(
        lines in prop::collection::vec(
            (1u32..50_000, prop::option::of(1u32..50_000), 1i32..=100),
            1..8,
        )
    ) {
        let lines: Vec<PricedLine> = lines
            .into_iter()
            .map(|(cents, sale, quantity)| {
                line(Decimal::new(cents as i64, 2), sale.map(|s| Decimal::new(s as i64, 2)), quantity)
            })
            .collect();

        let totals = price_order(&lines);
        prop_assert!(totals.is_consistent());
        prop_assert!(totals.discount >= Decimal::ZERO);
        prop_assert!(totals.discount <= totals.subtotal);
        prop_assert!(totals.total >= Decimal::ZERO);
        prop_assert!(totals.tax.scale() <= 2);
    }
}
