//! 轴标定与单位换算
//!
//! 协议层只认识步（steps），用户只认识自己的单位（mm、度……）。
//! 两者之间的换算全部集中在这里，由命令层在构建帧时调用。
//!
//! # 示例
//!
//! ```rust
//! use stepper_client::{Calibration, Direction};
//!
//! let cal = Calibration::new(100.0, Direction::Normal, 0.0, 1000.0);
//! assert_eq!(cal.units_to_steps(500.0), Some(50_000));
//! assert_eq!(cal.steps_to_units(50_000), 500.0);
//!
//! // 减速比 1:10 的 200 步电机，16 细分：每输出圈 32000 脉冲
//! let rotary = Calibration::rotary(32_000, Direction::Reversed);
//! assert_eq!(rotary.units_to_steps(90.0), Some(-8_000));
//! ```

use serde::{Deserialize, Serialize};

/// 运动方向约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 用户正方向 = 电机正方向
    #[default]
    Normal,
    /// 用户正方向 = 电机反方向
    Reversed,
}

impl Direction {
    /// 方向符号（+1 / -1）
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Normal => 1.0,
            Direction::Reversed => -1.0,
        }
    }
}

/// 轴标定参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// 每用户单位的步数（> 0）
    pub steps_per_unit: f64,
    /// 方向约定
    pub direction: Direction,
    /// 软限位下限（用户单位，含）
    pub soft_min: f64,
    /// 软限位上限（用户单位，含）
    pub soft_max: f64,
}

impl Calibration {
    pub fn new(steps_per_unit: f64, direction: Direction, soft_min: f64, soft_max: f64) -> Self {
        Self {
            steps_per_unit,
            direction,
            soft_min,
            soft_max,
        }
    }

    /// 旋转轴标定：用户单位为度
    ///
    /// `pulses_per_output_rev` 为输出轴转一圈所需的脉冲数（含细分和减速比）。
    /// 软限位默认不限制，可用 [`with_limits`](Self::with_limits) 设置。
    pub fn rotary(pulses_per_output_rev: u32, direction: Direction) -> Self {
        Self::new(
            f64::from(pulses_per_output_rev) / 360.0,
            direction,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
    }

    /// 设置软限位
    pub fn with_limits(mut self, soft_min: f64, soft_max: f64) -> Self {
        self.soft_min = soft_min;
        self.soft_max = soft_max;
        self
    }

    /// 目标位置是否在软限位内（闭区间）
    pub fn contains(&self, position: f64) -> bool {
        position.is_finite() && position >= self.soft_min && position <= self.soft_max
    }

    /// 用户单位 → 步（四舍五入，含方向）
    ///
    /// 非有限值或超出 i32 范围时返回 `None`。
    pub fn units_to_steps(&self, units: f64) -> Option<i32> {
        let steps = (units * self.steps_per_unit * self.direction.sign()).round();
        if steps.is_finite() && steps >= f64::from(i32::MIN) && steps <= f64::from(i32::MAX) {
            Some(steps as i32)
        } else {
            None
        }
    }

    /// 步 → 用户单位（含方向）
    pub fn steps_to_units(&self, steps: i32) -> f64 {
        f64::from(steps) / self.steps_per_unit * self.direction.sign()
    }

    /// 速度换算：用户单位/秒 → 步/秒
    ///
    /// 速度是无方向的量，必须为正且不超过 u16 范围，否则返回 `None`。
    pub fn speed_to_steps(&self, speed: f64) -> Option<u16> {
        let steps = (speed * self.steps_per_unit).round();
        if speed > 0.0 && steps >= 1.0 && steps <= f64::from(u16::MAX) {
            Some(steps as u16)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_conversion() {
        let cal = Calibration::new(100.0, Direction::Normal, 0.0, 1000.0);
        assert_eq!(cal.units_to_steps(500.0), Some(50_000));
        assert_eq!(cal.units_to_steps(0.004), Some(0));
        assert_eq!(cal.units_to_steps(0.005), Some(1));
        assert_eq!(cal.steps_to_units(50_000), 500.0);
        assert_eq!(cal.speed_to_steps(50.0), Some(5_000));
    }

    #[test]
    fn test_reversed_direction() {
        let cal = Calibration::new(100.0, Direction::Reversed, -10.0, 10.0);
        assert_eq!(cal.units_to_steps(2.5), Some(-250));
        assert_eq!(cal.steps_to_units(-250), 2.5);
        // 速度不带方向
        assert_eq!(cal.speed_to_steps(1.0), Some(100));
    }

    #[test]
    fn test_soft_limits_inclusive() {
        let cal = Calibration::new(1.0, Direction::Normal, 0.0, 1000.0);
        assert!(cal.contains(0.0));
        assert!(cal.contains(1000.0));
        assert!(!cal.contains(-0.001));
        assert!(!cal.contains(1000.001));
        assert!(!cal.contains(f64::NAN));
    }

    #[test]
    fn test_rotary_calibration() {
        let cal = Calibration::rotary(3_600, Direction::Normal);
        assert_eq!(cal.steps_per_unit, 10.0);
        assert_eq!(cal.units_to_steps(-45.0), Some(-450));
        assert!(cal.contains(1.0e6));

        let limited = cal.with_limits(-90.0, 90.0);
        assert!(!limited.contains(91.0));
    }

    #[test]
    fn test_conversion_overflow() {
        let cal = Calibration::new(1_000.0, Direction::Normal, f64::MIN, f64::MAX);
        assert_eq!(cal.units_to_steps(1.0e9), None);
        assert_eq!(cal.units_to_steps(f64::NAN), None);
        assert_eq!(cal.speed_to_steps(0.0), None);
        assert_eq!(cal.speed_to_steps(-1.0), None);
        assert_eq!(cal.speed_to_steps(70.0), None);
        assert_eq!(cal.speed_to_steps(65.535), Some(65_535));
    }
}
