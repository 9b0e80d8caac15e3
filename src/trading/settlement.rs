// src/trading/settlement.rs
// Applies a fill to the portfolio and account usage
use rust_decimal::Decimal;

use crate::domain::models::AssetId;
use crate::domain::orders::{Account, Holding, OrderSide, Portfolio};

/// Summary of what a fill did to the portfolio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub notional: Decimal,
    /// Signed change in cash
    pub cash_delta: Decimal,
    /// Short quantity bought back
    pub covered: Decimal,
    /// Quantity newly sold short
    pub shorted: Decimal,
}

/// Settle a fill of `quantity` at `price`.
///
/// Buys cover open shorts before adding to the holding; sells beyond the held
/// quantity open a short. Callers validate short-sale permission first.
pub fn settle(
    portfolio: &mut Portfolio,
    account: &mut Account,
    asset_id: AssetId,
    side: OrderSide,
    quantity: Decimal,
    price: Decimal,
    fees: Decimal,
) -> Settlement {
    let notional = (quantity * price).round_dp(2);
    let mut covered = Decimal::ZERO;
    let mut shorted = Decimal::ZERO;

    let cash_delta = match side {
        OrderSide::Buy => {
            let short = portfolio.short_quantity(&asset_id);
            covered = short.min(quantity);
            if covered > Decimal::ZERO {
                let left = short - covered;
                if left.is_zero() {
                    portfolio.short_positions.remove(&asset_id);
                } else {
                    portfolio.short_positions.insert(asset_id, left);
                }
            }

            let added = quantity - covered;
            if added > Decimal::ZERO {
                let holding = portfolio.holdings.entry(asset_id).or_insert(Holding {
                    asset_id,
                    quantity: Decimal::ZERO,
                    average_cost: Decimal::ZERO,
                });
                let total = holding.quantity + added;
                holding.average_cost =
                    ((holding.quantity * holding.average_cost + added * price) / total).round_dp(2);
                holding.quantity = total;
            }

            -(notional + fees)
        }
        OrderSide::Sell => {
            let held = portfolio.held_quantity(&asset_id);
            let from_holding = held.min(quantity);
            if let Some(holding) = portfolio.holdings.get_mut(&asset_id) {
                holding.quantity -= from_holding;
                if holding.quantity <= Decimal::ZERO {
                    portfolio.holdings.remove(&asset_id);
                }
            }

            shorted = quantity - from_holding;
            if shorted > Decimal::ZERO {
                *portfolio.short_positions.entry(asset_id).or_insert(Decimal::ZERO) += shorted;
            }

            notional - fees
        }
    };

    portfolio.cash_balance += cash_delta;
    account.daily_trading_used += notional;

    Settlement {
        notional,
        cash_delta,
        covered,
        shorted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fixtures() -> (Portfolio, Account, AssetId) {
        let account = Account::new("bob", dec!(10000), dec!(10000));
        (Portfolio::new(account.id, dec!(1000)), account, Uuid::new_v4())
    }

    #[test]
    fn buys_average_into_the_holding() {
        let (mut portfolio, mut account, asset) = fixtures();
        settle(&mut portfolio, &mut account, asset, OrderSide::Buy, dec!(10), dec!(10.00), dec!(1));
        settle(&mut portfolio, &mut account, asset, OrderSide::Buy, dec!(10), dec!(12.00), dec!(1));

        let holding = &portfolio.holdings[&asset];
        assert_eq!(holding.quantity, dec!(20));
        assert_eq!(holding.average_cost, dec!(11.00));
        assert_eq!(portfolio.cash_balance, dec!(1000) - dec!(100) - dec!(120) - dec!(2));
        assert_eq!(account.daily_trading_used, dec!(220));
    }

    #[test]
    fn selling_to_zero_removes_the_holding() {
        let (mut portfolio, mut account, asset) = fixtures();
        settle(&mut portfolio, &mut account, asset, OrderSide::Buy, dec!(5), dec!(20.00), dec!(1));
        let result = settle(&mut portfolio, &mut account, asset, OrderSide::Sell, dec!(5), dec!(22.00), dec!(1));

        assert!(!portfolio.holdings.contains_key(&asset));
        assert_eq!(result.cash_delta, dec!(109));
        assert_eq!(result.shorted, Decimal::ZERO);
        assert_eq!(portfolio.cash_balance, dec!(1000) - dec!(101) + dec!(109));
    }

    #[test]
    fn short_sale_opens_and_buy_covers() {
        let (mut portfolio, mut account, asset) = fixtures();
        settle(&mut portfolio, &mut account, asset, OrderSide::Buy, dec!(2), dec!(10.00), dec!(1));
        let sold = settle(&mut portfolio, &mut account, asset, OrderSide::Sell, dec!(5), dec!(10.00), dec!(1));
        assert_eq!(sold.shorted, dec!(3));
        assert!(!portfolio.holdings.contains_key(&asset));
        assert_eq!(portfolio.short_quantity(&asset), dec!(3));

        let bought = settle(&mut portfolio, &mut account, asset, OrderSide::Buy, dec!(4), dec!(9.00), dec!(1));
        assert_eq!(bought.covered, dec!(3));
        assert!(portfolio.short_positions.is_empty());
        assert_eq!(portfolio.holdings[&asset].quantity, dec!(1));
        assert_eq!(portfolio.holdings[&asset].average_cost, dec!(9.00));
    }
}
