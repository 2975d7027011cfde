use bookstore_api::domain::error::DomainError;
use bookstore_api::domain::model::{
    Book, BookId, CategoryId, Money, Order, OrderId, OrderStatus, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn money(cents: i64) -> Money {
    Money::new(Decimal::new(cents, 2)).unwrap()
}

fn book(price_cents: i64, stock: u32) -> Book {
    Book::new(
        BookId::new(),
        "Bumi Manusia".to_string(),
        "Pramoedya Ananta Toer".to_string(),
        money(price_cents),
        stock,
        1980,
        CategoryId::new(),
    )
    .unwrap()
}

// Money のプロパティベーステスト
proptest! {
    /// Money の加算は交換法則を満たす (a + b = b + a)
    #[test]
    fn test_money_addition_is_commutative(
        a in 0i64..1_000_000,
        b in 0i64..1_000_000,
    ) {
        prop_assert_eq!(money(a).add(&money(b)).unwrap(), money(b).add(&money(a)).unwrap());
    }

    /// Money の乗算は分配法則を満たす (a * (b + c) = a * b + a * c)
    #[test]
    fn test_money_multiplication_distributive(
        cents in 1i64..100_000,
        factor1 in 1u32..100,
        factor2 in 1u32..100,
    ) {
        let price = money(cents);

        let left = price.multiply(factor1 + factor2).unwrap();
        let right = price
            .multiply(factor1)
            .unwrap()
            .add(&price.multiply(factor2).unwrap())
            .unwrap();

        prop_assert_eq!(left, right);
    }

    /// 表示は常に小数点以下2桁
    #[test]
    fn test_money_display_has_two_decimals(cents in 0i64..10_000_000) {
        let rendered = money(cents).to_string();
        let (_, fraction) = rendered.split_once('.').unwrap();

        prop_assert_eq!(fraction.len(), 2);
        prop_assert_eq!(rendered.parse::<Decimal>().unwrap(), Decimal::new(cents, 2));
    }

    /// 負の金額は作成できない
    #[test]
    fn test_negative_money_is_rejected(cents in 1i64..1_000_000) {
        prop_assert!(Money::new(Decimal::new(-cents, 2)).is_err());
    }
}

// 注文のプロパティベーステスト
proptest! {
    /// 合計金額は常に明細の小計の合計と等しい
    #[test]
    fn test_order_total_equals_sum_of_lines(
        lines in prop::collection::vec((1i64..50_000, 1u32..20), 1..10),
    ) {
        let mut order = Order::new(OrderId::new(), UserId::new());
        let mut expected = Decimal::ZERO;

        for (price_cents, quantity) in &lines {
            let item = order.add_item(&book(*price_cents, 100), *quantity).unwrap();
            prop_assert_eq!(item.line_total(), item.unit_price().multiply(*quantity).unwrap());
            expected += Decimal::new(*price_cents, 2) * Decimal::from(*quantity);
        }

        prop_assert_eq!(order.total_price().amount(), expected);
        prop_assert_eq!(order.total_price(), order.calculate_total().unwrap());
        prop_assert_eq!(order.items().len(), lines.len());
    }

    /// 明細番号は1から連番になる
    #[test]
    fn test_line_numbers_are_sequential(count in 1usize..15) {
        let mut order = Order::new(OrderId::new(), UserId::new());
        for _ in 0..count {
            order.add_item(&book(1000, 10), 1).unwrap();
        }

        let numbers: Vec<u32> = order.items().iter().map(|i| i.line_number()).collect();
        let expected: Vec<u32> = (1..=count as u32).collect();
        prop_assert_eq!(numbers, expected);
    }

    /// 支払い後の注文は再度支払えない
    #[test]
    fn test_paid_order_cannot_be_paid_again(quantity in 1u32..10) {
        let mut order = Order::new(OrderId::new(), UserId::new());
        order.add_item(&book(1500, 10), quantity).unwrap();

        prop_assert!(order.pay().is_ok());
        prop_assert_eq!(order.status(), OrderStatus::Paid);
        prop_assert!(matches!(order.pay(), Err(DomainError::InvalidOrderState(_))));
    }
}

// 在庫のプロパティベーステスト
proptest! {
    /// 引当が成功すると在庫は数量分だけ減り、失敗すると変わらない
    #[test]
    fn test_reserve_stock_conserves_quantity(
        stock in 0u32..1_000,
        requests in prop::collection::vec(1u32..200, 1..20),
    ) {
        let mut target = book(1000, stock);
        let mut reserved: u64 = 0;

        for quantity in requests {
            let before = target.stock();
            match target.reserve_stock(quantity) {
                Ok(()) => {
                    prop_assert_eq!(target.stock(), before - quantity);
                    reserved += u64::from(quantity);
                }
                Err(DomainError::InsufficientStock { requested, available, .. }) => {
                    prop_assert!(quantity > before);
                    prop_assert_eq!(requested, quantity);
                    prop_assert_eq!(available, before);
                    prop_assert_eq!(target.stock(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        prop_assert_eq!(u64::from(target.stock()) + reserved, u64::from(stock));
    }
}
