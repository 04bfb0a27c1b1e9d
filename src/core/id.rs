//! 笔记 ID 生成模块
//!
//! 从可配置字符集生成短随机 ID，随机源由调用方注入
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use zettel_engine::core::id::IdGenerator;
//!
//! let mut ids = IdGenerator::with_rng(StdRng::seed_from_u64(7), "abc0", 4).unwrap();
//! assert_eq!(ids.generate().len(), 4);
//! ```

use crate::core::config::IdConfig;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::LazyLock;

/// `generate_unused` 的最大尝试次数
const MAX_ATTEMPTS: usize = 32;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("static id pattern"));

/// ID 生成器
///
/// 泛型参数 `R` 为随机源；测试中使用固定种子的 `StdRng`
#[derive(Debug, Clone)]
pub struct IdGenerator<R: Rng> {
    rng: R,
    alphabet: Vec<char>,
    length: usize,
}

impl IdGenerator<StdRng> {
    /// 按配置创建使用系统熵源的生成器
    pub fn from_entropy(config: &IdConfig) -> Result<Self> {
        Self::with_rng(StdRng::from_entropy(), &config.alphabet, config.length)
    }
}

impl<R: Rng> IdGenerator<R> {
    /// 使用指定随机源创建生成器
    ///
    /// # Arguments
    ///
    /// * `rng` - 随机源
    /// * `alphabet` - 可用字符集
    /// * `length` - ID 长度
    ///
    /// # Returns
    ///
    /// 长度为 0、字符集为空或含有小写字母与数字以外的字符时返回 `Error::Validation`
    pub fn with_rng(rng: R, alphabet: &str, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::validation("id length must be greater than zero"));
        }

        let mut chars: Vec<char> = Vec::new();
        for c in alphabet.chars() {
            if !(c.is_ascii_lowercase() || c.is_ascii_digit()) {
                return Err(Error::validation(format!(
                    "id alphabet may only contain lowercase letters and digits, got {:?}",
                    c
                )));
            }
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
        if chars.is_empty() {
            return Err(Error::validation("id alphabet must not be empty"));
        }

        Ok(Self {
            rng,
            alphabet: chars,
            length,
        })
    }

    /// 生成一个新 ID（不检查唯一性）
    pub fn generate(&mut self) -> String {
        (0..self.length)
            .map(|_| self.alphabet[self.rng.gen_range(0..self.alphabet.len())])
            .collect()
    }

    /// 生成一个未被占用的 ID
    ///
    /// # Arguments
    ///
    /// * `taken` - 判断 ID 是否已被占用
    ///
    /// # Returns
    ///
    /// 多次尝试后仍冲突时返回 `Error::Conflict`
    pub fn generate_unused(&mut self, taken: impl Fn(&str) -> bool) -> Result<String> {
        for _ in 0..MAX_ATTEMPTS {
            let id = self.generate();
            if !taken(&id) {
                return Ok(id);
            }
            tracing::debug!("generated id {} already taken, retrying", id);
        }
        Err(Error::Conflict(format!(
            "no free id after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

/// 校验 ID 格式：非空的小写字母与数字
pub fn validate_id(id: &str) -> Result<()> {
    if ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid note id {:?}: expected lowercase letters and digits",
            id
        )))
    }
}

/// 校验 ID 格式与长度
///
/// # Arguments
///
/// * `id` - 待校验的 ID
/// * `length` - 集合配置的 ID 长度
pub fn validate_id_length(id: &str, length: usize) -> Result<()> {
    validate_id(id)?;
    if id.len() != length {
        return Err(Error::validation(format!(
            "invalid note id {:?}: expected {} characters",
            id, length
        )));
    }
    Ok(())
}
