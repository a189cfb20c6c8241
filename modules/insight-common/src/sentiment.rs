//! Sentiment bands for the dashboard's summary panel.

/// Coarse band for a sentiment score in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentBand {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl SentimentBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.6 {
            SentimentBand::VeryPositive
        } else if score >= 0.4 {
            SentimentBand::Positive
        } else if score >= 0.0 {
            SentimentBand::Neutral
        } else if score >= -0.5 {
            SentimentBand::Negative
        } else {
            SentimentBand::VeryNegative
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SentimentBand::VeryPositive => "Very Positive",
            SentimentBand::Positive => "Positive",
            SentimentBand::Neutral => "Neutral",
            SentimentBand::Negative => "Negative",
            SentimentBand::VeryNegative => "Very Negative",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SentimentBand::VeryPositive => "😊",
            SentimentBand::Positive => "🙂",
            SentimentBand::Neutral => "😐",
            SentimentBand::Negative => "🙁",
            SentimentBand::VeryNegative => "😞",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            SentimentBand::VeryPositive | SentimentBand::Positive => {
                "This suggests generally positive market reception and opportunities."
            }
            SentimentBand::Neutral => "This represents a balanced or neutral market perspective.",
            SentimentBand::Negative | SentimentBand::VeryNegative => {
                "This indicates potential challenges or negative market conditions to consider."
            }
        }
    }
}

impl std::fmt::Display for SentimentBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for sentiment magnitude (strength regardless of direction).
pub fn magnitude_label(magnitude: f64) -> &'static str {
    if magnitude >= 0.6 {
        "High Intensity"
    } else if magnitude >= 0.3 {
        "Medium Intensity"
    } else {
        "Low Intensity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(SentimentBand::from_score(0.6), SentimentBand::VeryPositive);
        assert_eq!(SentimentBand::from_score(0.45), SentimentBand::Positive);
        assert_eq!(SentimentBand::from_score(0.0), SentimentBand::Neutral);
        assert_eq!(SentimentBand::from_score(-0.5), SentimentBand::Negative);
        assert_eq!(SentimentBand::from_score(-0.51), SentimentBand::VeryNegative);
    }

    #[test]
    fn test_negative_bands_read_as_challenges() {
        assert!(SentimentBand::VeryNegative
            .interpretation()
            .contains("challenges"));
        assert!(SentimentBand::Positive.interpretation().contains("positive"));
    }

    #[test]
    fn test_magnitude_label() {
        assert_eq!(magnitude_label(0.1), "Low Intensity");
        assert_eq!(magnitude_label(0.3), "Medium Intensity");
        assert_eq!(magnitude_label(2.0), "High Intensity");
    }
}
