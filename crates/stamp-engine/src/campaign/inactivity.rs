//! 沉睡客户扫描
//!
//! 对商户下每个集过章的客户计算距上次集章的整天数，生成 `InactivityCheck`
//! 事件交给评估器。事件 ID 包含上次集章时间，客户再次集章后同样的天数会重新触发。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::evaluator::CampaignEvaluator;
use super::event::CustomerEvent;
use crate::error::Result;
use crate::repository::CustomerRepository;
use crate::service::dto::InactivityScanReport;

pub struct InactivityScanner {
    customer_repo: Arc<CustomerRepository>,
    evaluator: Arc<CampaignEvaluator>,
}

impl InactivityScanner {
    pub fn new(customer_repo: Arc<CustomerRepository>, evaluator: Arc<CampaignEvaluator>) -> Self {
        Self {
            customer_repo,
            evaluator,
        }
    }

    /// 扫描单个商户
    #[instrument(skip(self))]
    pub async fn scan_business(
        &self,
        business_id: i64,
        now: DateTime<Utc>,
    ) -> Result<InactivityScanReport> {
        let customers = self.customer_repo.list_with_last_stamp(business_id).await?;
        let mut report = InactivityScanReport::default();

        for customer in customers {
            let (Some(last_stamp_at), Some(days)) =
                (customer.last_stamp_at, customer.days_since_last_stamp(now))
            else {
                continue;
            };
            report.customers_checked += 1;

            let event = CustomerEvent::InactivityCheck {
                days_since_last_stamp: days,
                last_stamp_at,
            };
            match self
                .evaluator
                .evaluate_and_enqueue(business_id, customer.id, &event)
                .await
            {
                Ok(scheduled) => report.messages_scheduled += scheduled,
                Err(e) => warn!(customer_id = customer.id, error = %e, "沉睡评估失败"),
            }
        }

        info!(
            business_id,
            customers_checked = report.customers_checked,
            messages_scheduled = report.messages_scheduled,
            "沉睡扫描完成"
        );
        Ok(report)
    }

    /// 扫描所有有集章记录的商户
    pub async fn scan_all(&self, now: DateTime<Utc>) -> Result<InactivityScanReport> {
        let mut total = InactivityScanReport::default();
        for business_id in self.customer_repo.list_business_ids_with_stamps().await? {
            match self.scan_business(business_id, now).await {
                Ok(report) => {
                    total.customers_checked += report.customers_checked;
                    total.messages_scheduled += report.messages_scheduled;
                }
                Err(e) => error!(business_id, error = %e, "商户沉睡扫描失败"),
            }
        }
        Ok(total)
    }

    /// 按固定间隔扫描
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 启动时的第一次 tick 立即返回，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.scan_all(Utc::now()).await {
                    error!(error = %e, "沉睡扫描任务失败");
                }
            }
        })
    }
}
