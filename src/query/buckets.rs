//! Dimension buckets shared by the SQL builders and the derived views.
//!
//! Labels are the exact strings the warehouse emits from the `CASE`
//! expressions below; views match rows back to buckets by label.

use serde::Serialize;

/// Credit-score bucket, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FicoBucket {
    Exceptional,
    VeryGood,
    Good,
    Fair,
    Poor,
    NoScore,
}

impl FicoBucket {
    pub const ALL: [Self; 6] = [
        Self::Exceptional,
        Self::VeryGood,
        Self::Good,
        Self::Fair,
        Self::Poor,
        Self::NoScore,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Exceptional => "Exceptional (800+)",
            Self::VeryGood => "Very Good (740-799)",
            Self::Good => "Good (670-739)",
            Self::Fair => "Fair (580-669)",
            Self::Poor => "Poor (<580)",
            Self::NoScore => "No Score",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Exceptional => "exceptional",
            Self::VeryGood => "very_good",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::NoScore => "no_score",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.slug() == slug)
    }

    /// Position in display order, used for sorting warehouse rows.
    pub fn rank(self) -> usize {
        Self::ALL.iter().position(|b| *b == self).unwrap_or(Self::ALL.len())
    }

    /// SQL expression mapping `FICO_SCORE` to a bucket label.
    pub const SQL_CASE: &'static str = "CASE
            WHEN FICO_SCORE IS NULL THEN 'No Score'
            WHEN FICO_SCORE < 580 THEN 'Poor (<580)'
            WHEN FICO_SCORE >= 580 AND FICO_SCORE < 670 THEN 'Fair (580-669)'
            WHEN FICO_SCORE >= 670 AND FICO_SCORE < 740 THEN 'Good (670-739)'
            WHEN FICO_SCORE >= 740 AND FICO_SCORE < 800 THEN 'Very Good (740-799)'
            WHEN FICO_SCORE >= 800 THEN 'Exceptional (800+)'
        END";
}

/// Coarser credit grouping used for the FICO x AOV heatmap rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FicoGroup {
    High,
    Good,
    Fair,
    Poor,
}

impl FicoGroup {
    pub const ALL: [Self; 4] = [Self::High, Self::Good, Self::Fair, Self::Poor];

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High FICO (740+)",
            Self::Good => "Good (670-739)",
            Self::Fair => "Fair (580-669)",
            Self::Poor => "Poor (<580)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.label() == label)
    }

    pub const SQL_CASE: &'static str = "CASE
            WHEN FICO_SCORE >= 740 THEN 'High FICO (740+)'
            WHEN FICO_SCORE >= 670 AND FICO_SCORE < 740 THEN 'Good (670-739)'
            WHEN FICO_SCORE >= 580 AND FICO_SCORE < 670 THEN 'Fair (580-669)'
            WHEN FICO_SCORE < 580 THEN 'Poor (<580)'
            ELSE 'No Score'
        END";
}

/// Order-value bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AovBucket {
    #[serde(rename = "under_150")]
    Under150,
    #[serde(rename = "150_500")]
    From150To500,
    #[serde(rename = "500_1000")]
    From500To1000,
    #[serde(rename = "1000_plus")]
    Over1000,
}

impl AovBucket {
    pub const ALL: [Self; 4] = [
        Self::Under150,
        Self::From150To500,
        Self::From500To1000,
        Self::Over1000,
    ];

    /// Label with a sort prefix, as emitted by the AOV dropoff query.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Under150 => "a. <$150",
            Self::From150To500 => "b. $150-$500",
            Self::From500To1000 => "c. $500-$1000",
            Self::Over1000 => "d. $1000+",
        }
    }

    /// Label without the prefix, as emitted by the heatmap query.
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::Under150 => "<$150",
            Self::From150To500 => "$150-$500",
            Self::From500To1000 => "$500-$1000",
            Self::Over1000 => "$1000+",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::Under150 => "under_150",
            Self::From150To500 => "150_500",
            Self::From500To1000 => "500_1000",
            Self::Over1000 => "1000_plus",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.label() == label || b.short_label() == label)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.slug() == slug)
    }

    pub const SQL_CASE: &'static str = "CASE
            WHEN TOTAL_AMOUNT < 150 THEN 'a. <$150'
            WHEN TOTAL_AMOUNT >= 150 AND TOTAL_AMOUNT < 500 THEN 'b. $150-$500'
            WHEN TOTAL_AMOUNT >= 500 AND TOTAL_AMOUNT < 1000 THEN 'c. $500-$1000'
            WHEN TOTAL_AMOUNT >= 1000 THEN 'd. $1000+'
        END";

    pub const SQL_CASE_SHORT: &'static str = "CASE
            WHEN TOTAL_AMOUNT < 150 THEN '<$150'
            WHEN TOTAL_AMOUNT >= 150 AND TOTAL_AMOUNT < 500 THEN '$150-$500'
            WHEN TOTAL_AMOUNT >= 500 AND TOTAL_AMOUNT < 1000 THEN '$500-$1000'
            WHEN TOTAL_AMOUNT >= 1000 THEN '$1000+'
        END";
}

/// Longest 0%-APR plan offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroAprBucket {
    None,
    UpTo6,
    UpTo12,
    Over12,
}

impl ZeroAprBucket {
    pub const ALL: [Self; 4] = [Self::None, Self::UpTo6, Self::UpTo12, Self::Over12];

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "a. No 0% APR",
            Self::UpTo6 => "b. 0% for 1-6 mo",
            Self::UpTo12 => "c. 0% for 7-12 mo",
            Self::Over12 => "d. 0% for 13+ mo",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }

    /// Longest plan length among the three offers whose APR is exactly zero.
    pub const SQL_LONGEST_ZERO_APR_PLAN: &'static str = "GREATEST(
            COALESCE(CASE WHEN OFFERED_APR1 = 0 THEN OFFERED_PLAN1_LENGTH ELSE 0 END, 0),
            COALESCE(CASE WHEN OFFERED_APR2 = 0 THEN OFFERED_PLAN2_LENGTH ELSE 0 END, 0),
            COALESCE(CASE WHEN OFFERED_APR3 = 0 THEN OFFERED_PLAN3_LENGTH ELSE 0 END, 0)
        )";
}
