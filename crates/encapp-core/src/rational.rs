//! 有理数, 用于帧率与时间基.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 编码会话默认帧率为 30/1, 时间基为 1/1_000_000 (微秒).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 微秒时间基 (1/1_000_000)
    pub const MICRO: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64, 分母为 0 时返回 `f64::NAN`
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 以本有理数为时间基, 计算一帧时长 (帧率为 `fps`)
    ///
    /// 例如时间基 1/1_000_000、帧率 30/1 时返回 33333.
    pub fn frame_duration(self, fps: Rational) -> i64 {
        if !self.is_valid() || fps.num == 0 || self.num == 0 {
            return 0;
        }
        let num = i64::from(self.den) * i64::from(fps.den);
        let den = i64::from(self.num) * i64::from(fps.num);
        num / den
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}
