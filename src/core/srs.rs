//! 间隔重复调度模块
//!
//! SM-2 变体：根据自评质量 (0-6) 更新易度、连续正确次数与下次复习时间
//!
//! ## 质量等级
//!
//! | 质量 | 含义 |
//! |------|------|
//! | 0    | 未复习 |
//! | 1-3  | 回答错误（熟悉度递增） |
//! | 4-6  | 回答正确（难度递减） |
//!
//! 调度是 `(旧状态, 质量, 当前时间)` 的纯函数，当前时间由调用方显式传入。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 新卡片的初始易度
pub const DEFAULT_EASINESS: f64 = 2.5;

/// 易度下限
pub const MIN_EASINESS: f64 = 1.3;

pub const MAX_QUALITY: i64 = 6;

/// 判定为“正确”的最低质量
pub const CORRECT_THRESHOLD: u8 = 4;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// 单次复习记录（只追加，不修改）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Unix 时间戳（秒）
    pub timestamp: i64,
    pub quality: u8,
}

/// 笔记的调度状态
///
/// 每次复习都生成一个完整的新值，从不局部修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsData {
    pub easiness: f64,
    pub consecutive_correct: u32,
    /// 下次复习时间，Unix 时间戳（秒）
    pub due: i64,
    pub total_reviews: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_history: Vec<ReviewRecord>,
}

impl Default for SrsData {
    fn default() -> Self {
        Self {
            easiness: DEFAULT_EASINESS,
            consecutive_correct: 0,
            due: 0,
            total_reviews: 0,
            review_history: Vec::new(),
        }
    }
}

impl SrsData {
    /// 校验调度状态的取值范围
    pub fn validate(&self) -> Result<()> {
        if !self.easiness.is_finite() || self.easiness < MIN_EASINESS {
            return Err(Error::validation(format!(
                "srs easiness {} is below the minimum {}",
                self.easiness, MIN_EASINESS
            )));
        }
        if self.total_reviews < self.consecutive_correct {
            return Err(Error::validation(format!(
                "srs total_reviews ({}) is less than consecutive_correct ({})",
                self.total_reviews, self.consecutive_correct
            )));
        }
        if let Some(record) = self
            .review_history
            .iter()
            .find(|r| i64::from(r.quality) > MAX_QUALITY)
        {
            return Err(Error::validation(format!(
                "review history quality {} is out of range 0-{}",
                record.quality, MAX_QUALITY
            )));
        }
        Ok(())
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.due <= now
    }
}

/// 经过校验的复习质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: i64) -> Result<Self> {
        if (0..=MAX_QUALITY).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::validation(format!(
                "review quality {} is out of range 0-{}",
                value, MAX_QUALITY
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= CORRECT_THRESHOLD
    }
}

impl TryFrom<i64> for Quality {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Quality::new(value)
    }
}

/// 质量是否算作回答正确
pub fn is_correct(quality: i64) -> bool {
    quality >= i64::from(CORRECT_THRESHOLD)
}

/// 新卡片总是到期；否则比较到期时间
pub fn is_due(data: Option<&SrsData>, now: i64) -> bool {
    data.map_or(true, |d| d.is_due(now))
}

/// 处理一次复习
///
/// # Arguments
///
/// * `previous` - 旧的调度状态，新卡片为 `None`
/// * `quality` - 自评质量，必须在 0-6 之间
/// * `now` - 当前 Unix 时间戳（秒）
///
/// # Returns
///
/// 新的完整调度状态；质量越界或旧状态无效时返回 `Error::Validation` 且不产生任何状态
pub fn process_review(previous: Option<&SrsData>, quality: i64, now: i64) -> Result<SrsData> {
    let quality = Quality::new(quality)?;
    if let Some(prev) = previous {
        prev.validate()?;
    }
    let record = ReviewRecord {
        timestamp: now,
        quality: quality.value(),
    };

    let next = match previous {
        None => schedule_new(quality, now, record),
        Some(prev) => schedule_existing(prev, quality, now, record),
    };
    Ok(next)
}

fn schedule_new(quality: Quality, now: i64, record: ReviewRecord) -> SrsData {
    let due = add_days(now, 1);

    // 质量 0 表示未复习，不经过易度公式
    if quality.value() == 0 {
        return SrsData {
            easiness: DEFAULT_EASINESS,
            consecutive_correct: 0,
            due,
            total_reviews: 0,
            review_history: vec![record],
        };
    }

    SrsData {
        easiness: next_easiness(DEFAULT_EASINESS, quality),
        consecutive_correct: u32::from(quality.is_correct()),
        due,
        total_reviews: 1,
        review_history: vec![record],
    }
}

fn schedule_existing(prev: &SrsData, quality: Quality, now: i64, record: ReviewRecord) -> SrsData {
    let easiness = next_easiness(prev.easiness, quality);
    let total_reviews = prev.total_reviews.saturating_add(1);

    let (consecutive_correct, due) = if quality.is_correct() {
        let days = interval_days(easiness, prev.consecutive_correct);
        (prev.consecutive_correct.saturating_add(1), add_days(now, days))
    } else {
        (0, add_days(now, 1))
    };

    let mut review_history = prev.review_history.clone();
    review_history.push(record);

    SrsData {
        easiness,
        consecutive_correct,
        due,
        total_reviews,
        review_history,
    }
}

/// `EF' = EF - 0.8 + 0.28q + 0.02q²`，其中 `q = quality - 1`，下限 1.3
fn next_easiness(old: f64, quality: Quality) -> f64 {
    let q = f64::from(quality.value()) - 1.0;
    let easiness = old - 0.8 + 0.28 * q + 0.02 * q * q;
    easiness.max(MIN_EASINESS)
}

/// 以天为单位的复习间隔
fn interval_days(easiness: f64, previous_correct: u32) -> i64 {
    match previous_correct {
        0 => 1,
        1 => 6,
        n => {
            let exponent = i32::try_from(n - 1).unwrap_or(i32::MAX);
            let days = (6.0 * easiness.powi(exponent)).round();
            if days >= i64::MAX as f64 {
                i64::MAX
            } else {
                days as i64
            }
        }
    }
}

fn add_days(now: i64, days: i64) -> i64 {
    now.saturating_add(days.saturating_mul(SECONDS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_new_card_quality_zero() {
        let data = process_review(None, 0, NOW).unwrap();
        assert_eq!(data.easiness, DEFAULT_EASINESS);
        assert_eq!(data.consecutive_correct, 0);
        assert_eq!(data.due, NOW + SECONDS_PER_DAY);
        assert_eq!(data.total_reviews, 0);
        assert_eq!(data.review_history, vec![ReviewRecord { timestamp: NOW, quality: 0 }]);
    }

    #[test]
    fn test_new_card_correct() {
        let data = process_review(None, 5, NOW).unwrap();
        // q = 4: 2.5 - 0.8 + 1.12 + 0.32
        assert!(approx(data.easiness, 3.14));
        assert_eq!(data.consecutive_correct, 1);
        assert_eq!(data.total_reviews, 1);
        assert_eq!(data.due, NOW + SECONDS_PER_DAY);
    }

    #[test]
    fn test_new_card_incorrect_still_due_tomorrow() {
        let data = process_review(None, 2, NOW).unwrap();
        // q = 1: 2.5 - 0.8 + 0.28 + 0.02
        assert!(approx(data.easiness, 2.0));
        assert_eq!(data.consecutive_correct, 0);
        assert_eq!(data.due, NOW + SECONDS_PER_DAY);
    }

    #[test]
    fn test_existing_card_interval_progression() {
        let first = process_review(None, 4, NOW).unwrap();
        assert_eq!(first.consecutive_correct, 1);

        // 旧连续正确次数为 1 -> 6 天
        let second = process_review(Some(&first), 4, NOW).unwrap();
        assert_eq!(second.consecutive_correct, 2);
        assert_eq!(second.due, NOW + 6 * SECONDS_PER_DAY);
        assert_eq!(second.total_reviews, 2);

        // 旧连续正确次数为 2 -> round(6 * EF)
        let third = process_review(Some(&second), 4, NOW).unwrap();
        let expected = (6.0 * third.easiness).round() as i64;
        assert_eq!(third.due, NOW + expected * SECONDS_PER_DAY);
        assert_eq!(third.consecutive_correct, 3);
    }

    #[test]
    fn test_existing_card_after_failure_gets_one_day() {
        let failed = SrsData {
            easiness: 2.2,
            consecutive_correct: 0,
            due: NOW,
            total_reviews: 3,
            review_history: Vec::new(),
        };
        let next = process_review(Some(&failed), 6, NOW).unwrap();
        assert_eq!(next.due, NOW + SECONDS_PER_DAY);
        assert_eq!(next.consecutive_correct, 1);
        assert_eq!(next.total_reviews, 4);
    }

    #[test]
    fn test_incorrect_resets_streak() {
        let card = SrsData {
            easiness: 2.5,
            consecutive_correct: 5,
            due: NOW,
            total_reviews: 7,
            review_history: Vec::new(),
        };
        let next = process_review(Some(&card), 3, NOW).unwrap();
        assert_eq!(next.consecutive_correct, 0);
        assert_eq!(next.due, NOW + SECONDS_PER_DAY);
        assert_eq!(next.total_reviews, 8);
        assert_eq!(next.review_history.len(), 1);
    }

    #[test]
    fn test_easiness_floor_holds() {
        let mut data = process_review(None, 1, NOW).unwrap();
        for i in 0..50 {
            data = process_review(Some(&data), 1, NOW + i).unwrap();
            assert!(data.easiness >= MIN_EASINESS);
        }
        assert!(approx(data.easiness, MIN_EASINESS));
    }

    #[test]
    fn test_intervals_non_decreasing_under_success() {
        let mut data = process_review(None, 4, NOW).unwrap();
        let mut last_interval = 0;
        for step in 0..8 {
            let next = process_review(Some(&data), 4 + (step % 3), NOW).unwrap();
            let interval = next.due - NOW;
            if step > 0 {
                assert!(interval >= last_interval, "step {step}: {interval} < {last_interval}");
            }
            last_interval = interval;
            data = next;
        }
    }

    #[test]
    fn test_history_appends_every_review() {
        let mut data = process_review(None, 0, NOW).unwrap();
        data = process_review(Some(&data), 4, NOW + 10).unwrap();
        data = process_review(Some(&data), 2, NOW + 20).unwrap();
        let qualities: Vec<u8> = data.review_history.iter().map(|r| r.quality).collect();
        assert_eq!(qualities, vec![0, 4, 2]);
        assert_eq!(data.review_history[2].timestamp, NOW + 20);
    }

    #[test]
    fn test_quality_bounds() {
        assert!(matches!(process_review(None, 7, NOW), Err(Error::Validation(_))));
        assert!(matches!(process_review(None, -1, NOW), Err(Error::Validation(_))));

        let card = SrsData::default();
        assert!(matches!(process_review(Some(&card), 7, NOW), Err(Error::Validation(_))));
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(None, 0));
        assert!(is_due(None, i64::MAX));

        let card = SrsData {
            due: NOW,
            ..SrsData::default()
        };
        assert!(is_due(Some(&card), NOW));
        assert!(!is_due(Some(&card), NOW - 1));
    }

    #[test]
    fn test_is_correct_threshold() {
        assert!(!is_correct(3));
        assert!(is_correct(4));
        assert!(Quality::new(6).unwrap().is_correct());
        assert!(!Quality::new(0).unwrap().is_correct());
    }

    #[test]
    fn test_long_streak_does_not_overflow() {
        let card = SrsData {
            easiness: 3.0,
            consecutive_correct: 5000,
            due: NOW,
            total_reviews: 5000,
            review_history: Vec::new(),
        };
        let next = process_review(Some(&card), 6, NOW).unwrap();
        assert_eq!(next.due, i64::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(SrsData::default().validate().is_ok());

        let low = SrsData {
            easiness: 1.0,
            ..SrsData::default()
        };
        assert!(low.validate().is_err());

        let inconsistent = SrsData {
            consecutive_correct: 3,
            total_reviews: 2,
            ..SrsData::default()
        };
        assert!(inconsistent.validate().is_err());
    }

    #[test]
    fn test_invalid_previous_state_is_rejected() {
        let inconsistent = SrsData {
            consecutive_correct: 3,
            total_reviews: 2,
            ..SrsData::default()
        };
        assert!(matches!(
            process_review(Some(&inconsistent), 5, NOW),
            Err(Error::Validation(_))
        ));

        let low = SrsData {
            easiness: 1.0,
            ..SrsData::default()
        };
        assert!(matches!(
            process_review(Some(&low), 5, NOW),
            Err(Error::Validation(_))
        ));
    }
}
