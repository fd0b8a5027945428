//! 经济系统：购买节点与升级的花费、每类节点的数量上限。

use crate::net::{DbRole, NodeKind, RunStats, Topology};
use crate::sim::EconomySpec;

use super::GameError;

#[derive(Debug, Clone, Default)]
pub struct Economy {
    spec: EconomySpec,
}

impl Economy {
    pub fn new(spec: EconomySpec) -> Self {
        Self { spec }
    }

    pub fn cost(&self, kind: NodeKind, role: DbRole) -> Result<u64, GameError> {
        let slug = kind.purchase_slug(role);
        self.spec
            .costs
            .get(slug)
            .copied()
            .ok_or_else(|| GameError::NotPurchasable {
                slug: slug.to_string(),
            })
    }

    pub fn limit(&self, kind: NodeKind, role: DbRole) -> Option<u32> {
        self.spec.limits.get(kind.purchase_slug(role)).copied()
    }

    pub fn upgrade_cost(&self) -> u64 {
        self.spec.upgrade_cost
    }

    /// 校验数量上限与余额，成功则扣款并返回花费
    pub fn charge_purchase(
        &self,
        stats: &mut RunStats,
        topo: &Topology,
        kind: NodeKind,
        role: DbRole,
    ) -> Result<u64, GameError> {
        let slug = kind.purchase_slug(role);
        let cost = self.cost(kind, role)?;
        if let Some(limit) = self.limit(kind, role) {
            if topo.count(kind, role) >= limit as usize {
                return Err(GameError::LimitReached {
                    slug: slug.to_string(),
                    limit,
                });
            }
        }
        Self::debit(stats, slug, cost)?;
        Ok(cost)
    }

    /// 余额足够才扣款
    pub fn debit(stats: &mut RunStats, slug: &str, cost: u64) -> Result<(), GameError> {
        if stats.money < cost {
            return Err(GameError::InsufficientFunds {
                slug: slug.to_string(),
                cost,
                money: stats.money,
            });
        }
        stats.money -= cost;
        Ok(())
    }
}
