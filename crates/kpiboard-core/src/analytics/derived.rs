//! Derived (non-additive) KPIs
//!
//! Basket value, conversion rate and items-per-sale are ratios: they are
//! only ever computed from summed additive fields, never averaged.

use serde::{Deserialize, Serialize};

use crate::models::{KpiRecord, KpiSums};

/// Ratios computed from additive sums
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Average basket value: ca / ventes
    pub panier_moyen: f64,
    /// Conversion rate in percent: ventes / clients * 100
    pub taux_transformation: f64,
    /// Items per sale: articles / ventes
    pub indice_vente: f64,
}

/// Compute derived KPIs; every ratio is 0 when its denominator is 0
pub fn derive_metrics(sums: &KpiSums) -> DerivedMetrics {
    let ventes = sums.ventes as f64;
    let clients = sums.clients as f64;

    DerivedMetrics {
        panier_moyen: if sums.ventes > 0 { sums.ca / ventes } else { 0.0 },
        taux_transformation: if sums.clients > 0 {
            (ventes / clients) * 100.0
        } else {
            0.0
        },
        indice_vente: if sums.ventes > 0 {
            sums.articles as f64 / ventes
        } else {
            0.0
        },
    }
}

impl KpiSums {
    pub fn derived(&self) -> DerivedMetrics {
        derive_metrics(self)
    }
}

impl KpiRecord {
    pub fn derived(&self) -> DerivedMetrics {
        derive_metrics(&KpiSums::from_records([self]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sums_yield_zero_ratios() {
        let m = derive_metrics(&KpiSums::default());
        assert_eq!(m, DerivedMetrics::default());
        assert!(!m.panier_moyen.is_nan());
        assert!(!m.taux_transformation.is_nan());
        assert!(!m.indice_vente.is_nan());
    }

    #[test]
    fn test_ratios() {
        let sums = KpiSums {
            ca: 1500.0,
            ventes: 12,
            clients: 40,
            articles: 30,
            days: 3,
        };
        let m = derive_metrics(&sums);
        assert_eq!(m.panier_moyen, 125.0);
        assert_eq!(m.taux_transformation, 30.0);
        assert_eq!(m.indice_vente, 2.5);
    }

    #[test]
    fn test_clients_without_sales() {
        let sums = KpiSums {
            ca: 0.0,
            ventes: 0,
            clients: 25,
            articles: 0,
            days: 1,
        };
        let m = derive_metrics(&sums);
        assert_eq!(m.taux_transformation, 0.0);
        assert_eq!(m.panier_moyen, 0.0);
    }

    #[test]
    fn test_sales_without_clients_keeps_conversion_at_zero() {
        let sums = KpiSums {
            ca: 200.0,
            ventes: 2,
            clients: 0,
            articles: 3,
            days: 1,
        };
        let m = derive_metrics(&sums);
        assert_eq!(m.taux_transformation, 0.0);
        assert_eq!(m.panier_moyen, 100.0);
        assert_eq!(m.indice_vente, 1.5);
    }
}
