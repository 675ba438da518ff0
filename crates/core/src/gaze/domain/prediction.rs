use serde::{Deserialize, Serialize};

/// Binary gaze decision for one frame (raw) or one window (stable).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionLabel {
    Forward,
    #[default]
    NotForward,
}

impl PredictionLabel {
    pub fn is_forward(self) -> bool {
        self == PredictionLabel::Forward
    }
}

/// Ordered class names emitted by the gaze model, plus the subset that
/// counts as looking at the camera.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    pub classes: Vec<String>,
    pub forward: Vec<String>,
}

impl LabelSet {
    pub fn new<S: Into<String>>(classes: Vec<S>, forward: Vec<S>) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            forward: forward.into_iter().map(Into::into).collect(),
        }
    }

    /// Four-way directional model; a close-up look still counts as forward.
    pub fn directional() -> Self {
        Self::new(
            vec!["forward_look", "close_look", "left_look", "right_look"],
            vec!["forward_look", "close_look"],
        )
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Map a class index to the binary label. Unknown indices are NotForward.
    pub fn label_for(&self, index: usize) -> PredictionLabel {
        match self.class_name(index) {
            Some(name) if self.forward.iter().any(|f| f == name) => PredictionLabel::Forward,
            _ => PredictionLabel::NotForward,
        }
    }

    /// Arg-max over `scores` mapped through [`LabelSet::label_for`].
    ///
    /// Equal maxima resolve to the lowest index; NaN scores never win.
    pub fn label_for_scores(&self, scores: &[f32]) -> PredictionLabel {
        let best = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            });
        best.map_or(PredictionLabel::NotForward, |(i, _)| self.label_for(i))
    }

    /// Every forward name must also be a class.
    pub fn unknown_forward_names(&self) -> Vec<&str> {
        self.forward
            .iter()
            .filter(|f| !self.classes.contains(f))
            .map(String::as_str)
            .collect()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(vec!["forward", "not_forward"], vec!["forward"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, PredictionLabel::Forward)]
    #[case(1, PredictionLabel::NotForward)]
    #[case(7, PredictionLabel::NotForward)]
    fn test_default_label_mapping(#[case] index: usize, #[case] expected: PredictionLabel) {
        assert_eq!(LabelSet::default().label_for(index), expected);
    }

    #[rstest]
    #[case(0, PredictionLabel::Forward)]
    #[case(1, PredictionLabel::Forward)]
    #[case(2, PredictionLabel::NotForward)]
    #[case(3, PredictionLabel::NotForward)]
    fn test_directional_label_mapping(#[case] index: usize, #[case] expected: PredictionLabel) {
        assert_eq!(LabelSet::directional().label_for(index), expected);
    }

    #[test]
    fn test_argmax_picks_highest_score() {
        let labels = LabelSet::default();
        assert_eq!(labels.label_for_scores(&[0.2, 0.8]), PredictionLabel::NotForward);
        assert_eq!(labels.label_for_scores(&[0.9, 0.1]), PredictionLabel::Forward);
    }

    #[test]
    fn test_argmax_tie_takes_first() {
        assert_eq!(
            LabelSet::default().label_for_scores(&[0.5, 0.5]),
            PredictionLabel::Forward
        );
    }

    #[test]
    fn test_argmax_ignores_nan() {
        assert_eq!(
            LabelSet::default().label_for_scores(&[f32::NAN, 0.1]),
            PredictionLabel::NotForward
        );
    }

    #[test]
    fn test_empty_scores_are_not_forward() {
        assert_eq!(LabelSet::default().label_for_scores(&[]), PredictionLabel::NotForward);
    }

    #[test]
    fn test_unknown_forward_names() {
        let labels = LabelSet::new(vec!["a", "b"], vec!["b", "c"]);
        assert_eq!(labels.unknown_forward_names(), vec!["c"]);
    }

    #[test]
    fn test_label_serializes_snake_case() {
        let json = serde_json::to_string(&PredictionLabel::NotForward).unwrap();
        assert_eq!(json, "\"not_forward\"");
    }
}
