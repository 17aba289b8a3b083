//! 视频模板
//!
//! 模板只决定背景色和强调色，脚本落库时随机选定，之后不再变化。

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// 视频模板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: u8,
    pub background: Rgb,
    pub accent: Rgb,
}

/// 可选模板
pub const TEMPLATES: [Template; 5] = [
    // 石板蓝
    Template {
        id: 1,
        background: Rgb(15, 23, 42),
        accent: Rgb(59, 130, 246),
    },
    // 灰绿
    Template {
        id: 2,
        background: Rgb(17, 24, 39),
        accent: Rgb(16, 185, 129),
    },
    // 紫
    Template {
        id: 3,
        background: Rgb(20, 14, 28),
        accent: Rgb(168, 85, 247),
    },
    // 青
    Template {
        id: 4,
        background: Rgb(7, 29, 35),
        accent: Rgb(34, 211, 238),
    },
    // 橙
    Template {
        id: 5,
        background: Rgb(30, 17, 9),
        accent: Rgb(251, 146, 60),
    },
];

/// 旧数据缺少模板时使用
pub const DEFAULT_TEMPLATE_ID: u8 = 1;

impl Template {
    pub fn by_id(id: u8) -> Option<Template> {
        TEMPLATES.iter().copied().find(|t| t.id == id)
    }

    /// 均匀随机选择一个模板
    pub fn random() -> Template {
        *TEMPLATES
            .choose(&mut rand::thread_rng())
            .unwrap_or(&TEMPLATES[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_template_is_from_catalogue() {
        for _ in 0..50 {
            let t = Template::random();
            assert_eq!(Template::by_id(t.id), Some(t));
        }
    }

    #[test]
    fn test_unknown_template() {
        assert!(Template::by_id(0).is_none());
        assert!(Template::by_id(6).is_none());
        assert!(Template::by_id(DEFAULT_TEMPLATE_ID).is_some());
    }
}
