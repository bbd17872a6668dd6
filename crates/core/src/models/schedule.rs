use serde::{Deserialize, Serialize};

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// 周期触发规格，全部按 UTC 计算
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSpec {
    /// 固定间隔（秒）
    Interval { seconds: u64 },
    /// 类 crontab：{日 或 星期, 小时, 分钟}
    Crontab(CrontabSpec),
}

/// `day_of_month` 与 `day_of_week` 至多设置一个；都不设置表示每天触发。
/// `day_of_week` 取值 0-6，0 表示周日。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrontabSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleSpec {
    pub fn every_seconds(seconds: u64) -> Self {
        ScheduleSpec::Interval { seconds }
    }

    pub fn monthly(day_of_month: u32, hour: u32, minute: u32) -> Self {
        ScheduleSpec::Crontab(CrontabSpec {
            day_of_month: Some(day_of_month),
            day_of_week: None,
            hour,
            minute,
        })
    }

    pub fn weekly(day_of_week: u32, hour: u32, minute: u32) -> Self {
        ScheduleSpec::Crontab(CrontabSpec {
            day_of_month: None,
            day_of_week: Some(day_of_week),
            hour,
            minute,
        })
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        match self {
            ScheduleSpec::Interval { seconds } => {
                if *seconds == 0 {
                    return Err(OrchestratorError::validation("调度间隔必须大于0秒"));
                }
                Ok(())
            }
            ScheduleSpec::Crontab(spec) => spec.validate(),
        }
    }
}

impl CrontabSpec {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.day_of_month.is_some() && self.day_of_week.is_some() {
            return Err(OrchestratorError::validation(
                "day_of_month 和 day_of_week 不能同时设置",
            ));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(OrchestratorError::validation(format!(
                    "day_of_month 超出范围: {day}"
                )));
            }
        }
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(OrchestratorError::validation(format!(
                    "day_of_week 超出范围: {day}"
                )));
            }
        }
        if self.hour > 23 {
            return Err(OrchestratorError::validation(format!(
                "hour 超出范围: {}",
                self.hour
            )));
        }
        if self.minute > 59 {
            return Err(OrchestratorError::validation(format!(
                "minute 超出范围: {}",
                self.minute
            )));
        }
        Ok(())
    }

    /// 转换为六段式 cron 表达式（秒 分 时 日 月 星期）
    pub fn to_cron_expression(&self) -> String {
        let day_of_month = self
            .day_of_month
            .map(|d| d.to_string())
            .unwrap_or_else(|| "*".to_string());
        let day_of_week = self
            .day_of_week
            .and_then(|d| WEEKDAY_NAMES.get(d as usize))
            .map(|name| name.to_string())
            .unwrap_or_else(|| "*".to_string());

        format!(
            "0 {} {} {} * {}",
            self.minute, self.hour, day_of_month, day_of_week
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cron_expression_rendering() {
        let ScheduleSpec::Crontab(monthly) = ScheduleSpec::monthly(1, 6, 30) else {
            panic!("expected crontab");
        };
        assert_eq!(monthly.to_cron_expression(), "0 30 6 1 * *");

        let ScheduleSpec::Crontab(weekly) = ScheduleSpec::weekly(1, 3, 0) else {
            panic!("expected crontab");
        };
        assert_eq!(weekly.to_cron_expression(), "0 0 3 * * Mon");
    }

    #[test]
    fn test_validation_rules() {
        assert!(ScheduleSpec::every_seconds(300).validate().is_ok());
        assert!(ScheduleSpec::every_seconds(0).validate().is_err());
        assert!(ScheduleSpec::monthly(32, 0, 0).validate().is_err());
        assert!(ScheduleSpec::weekly(7, 0, 0).validate().is_err());
        assert!(ScheduleSpec::weekly(0, 24, 0).validate().is_err());

        let both = ScheduleSpec::Crontab(CrontabSpec {
            day_of_month: Some(1),
            day_of_week: Some(1),
            hour: 0,
            minute: 0,
        });
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let spec: ScheduleSpec = serde_json::from_value(json!({
            "type": "crontab",
            "day_of_week": 1,
            "hour": 3,
            "minute": 0
        }))
        .unwrap();
        assert_eq!(spec, ScheduleSpec::weekly(1, 3, 0));

        let interval = serde_json::to_value(ScheduleSpec::every_seconds(300)).unwrap();
        assert_eq!(interval, json!({"type": "interval", "seconds": 300}));
    }
}
