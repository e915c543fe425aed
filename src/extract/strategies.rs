//! Per-field fallback chains, kept as data so new markup variants are
//! additive rather than structural changes.
//!
//! Chains are ordered most-specific first: the exact paths observed on the
//! live storefront (styled-component hashes included), then
//! attribute-contains selectors that survive cosmetic class-hash churn,
//! then text probes.

/// One extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Inner text of the first selector match.
    Text(&'static str),
    /// Attribute of the first selector match.
    Attr(&'static str, &'static str),
    /// Inner text of the first `selector` match containing the needle.
    /// Runs as a script probe — CSS alone can't express this.
    TextContains(&'static str, &'static str),
}

/// Required anchor element: the page is considered ready once the product
/// title renders.
pub const ANCHOR: &str = r#"a[class*="ProductDetails__ProductTitle"]"#;

pub const TITLE: &[Probe] = &[
    Probe::Text(ANCHOR),
    Probe::Text(r#"[class*="ProductTitle"]"#),
];

pub const CREATOR_NAME: &[Probe] = &[Probe::TextContains("a", "By:")];

pub const CREATOR_LINK: &[Probe] = &[Probe::Attr(
    r#"[class*="CreatorMessage__CreatorMessageWrapper"] a"#,
    "href",
)];

pub const CATEGORY: &[Probe] = &[
    Probe::Text(r#"[class*="ProductInfo__ProductHeaderWrapper"] a[href*="/shop/"] p"#),
    Probe::Text(r#"[class*="ProductInfo__ProductHeaderWrapper"] a[href*="/collections/"] p"#),
    Probe::TextContains(r#"[class*="ProductInfo__ProductHeaderWrapper"] a"#, "Store"),
];

pub const PRICE: &[Probe] = &[
    Probe::Text(r#"[class*="ProductDetails__Price"]"#),
    Probe::Text(r#"[class*="ProductInfo__Price"]"#),
    Probe::TextContains("p", "Total Price:"),
];

pub const SALES: &[Probe] = &[
    Probe::Text(
        "#__next > div._app__ContainerWrapper-sc-meusgd-0.fdDSJw > div > div._app__ContentWrapper-sc-meusgd-2.iURiPk > div > div > div.handle__ProductInfoWrapper-sc-1y81hk8-2.kYqEeP > div > div:nth-child(3) > div > div.ProgressBarContainer__ProgressRow-sc-1slgn8k-2.cbQHDc > p",
    ),
    Probe::Text(
        "#__next > div._app__ContainerWrapper-sc-meusgd-0.fdDSJw > div > div._app__ContentWrapper-sc-meusgd-2.iURiPk > div > div > div.handle__ProductInfoWrapper-sc-1y81hk8-2.kYqEeP > div > div:nth-child(3) > div > div.ProgressBarContainer__PastLimitedCampaignRow-sc-1slgn8k-3.bLtdCY > p",
    ),
    Probe::Text(r#"p[data-testid="units-sold-text"]"#),
    Probe::TextContains("p", "Sold Out"),
];

pub const FUNDED: &[Probe] = &[
    Probe::Text(
        "#__next > div._app__ContainerWrapper-sc-meusgd-0.fdDSJw > div > div._app__ContentWrapper-sc-meusgd-2.iURiPk > div > div > div.handle__ProductInfoWrapper-sc-1y81hk8-2.kYqEeP > div > div:nth-child(3) > div > div.ProgressBarContainer__ProgressRow-sc-1slgn8k-2.cbQHDc > div > p",
    ),
    Probe::TextContains("p", "% Funded"),
];

pub const END_DATE: &[Probe] = &[
    Probe::Text(
        "#__next > div._app__ContainerWrapper-sc-meusgd-0.fdDSJw > div > div._app__ContentWrapper-sc-meusgd-2.iURiPk > div > div > div.handle__ProductInfoWrapper-sc-1y81hk8-2.kYqEeP > div > div:nth-child(3) > div > p",
    ),
    Probe::Text(r#"[class*="ProductPageCountdown__CountdownDate"]"#),
];

pub const SHIP_DATE: &[Probe] = &[
    Probe::Text(
        "#__next > div._app__ContainerWrapper-sc-meusgd-0.fdDSJw > div > div._app__ContentWrapper-sc-meusgd-2.iURiPk > div > div > div.handle__ProductInfoWrapper-sc-1y81hk8-2.kYqEeP > div > div.ProductInfo__PostPurchaseDetailsWrapper-sc-pdgh6r-9.jthCJt > div > div > p",
    ),
    Probe::Text(r#"[class*="HybridMessagingContainer"]"#),
    Probe::TextContains("p", "Ships "),
    Probe::TextContains("p", "estimated to ship on"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_heads_title_chain() {
        assert_eq!(TITLE[0], Probe::Text(ANCHOR));
    }

    #[test]
    fn test_chains_end_in_generic_probes() {
        // Specific-first ordering: the last entry of each multi-step chain
        // is a class-fragment or text probe, never a hashed path.
        for chain in [TITLE, CATEGORY, PRICE, SALES, FUNDED, END_DATE, SHIP_DATE] {
            assert!(!chain.is_empty());
            match chain[chain.len() - 1] {
                Probe::Text(sel) => assert!(!sel.starts_with("#__next")),
                Probe::Attr(sel, _) => assert!(!sel.starts_with("#__next")),
                Probe::TextContains(..) => {}
            }
        }
    }

    #[test]
    fn test_sales_chain_covers_sold_out() {
        assert!(SALES.contains(&Probe::TextContains("p", "Sold Out")));
        assert!(SALES.contains(&Probe::Text(r#"p[data-testid="units-sold-text"]"#)));
    }
}
