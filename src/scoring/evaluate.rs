//! Per-kind answer correctness, as the service judges it

use serde_json::{json, Value};

use crate::challenge::models::{Question, QuestionKind};
use crate::error::{KahootError, Result};

/// Characters removed from open-ended answers before comparison
const STRIPPED_PUNCTUATION: &[char] = &[
    '~', '`', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '{', '}', '[', ']', ';', ':', '"',
    '\'', '<', ',', '.', '>', '?', '/', '\\', '|', '-', '_', '+', '=',
];

/// What the player submitted for one question
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Index(usize),
    /// Jumble ordering, as choice indices
    Order(Vec<usize>),
    /// Multiple-select picks
    Selection(Vec<usize>),
    Text(String),
}

impl Submission {
    /// Interpret the `choice` field of an answer frame for a question kind
    pub fn from_value(kind: &QuestionKind, value: &Value) -> Result<Self> {
        let indices = |value: &Value| -> Result<Vec<usize>> {
            value
                .as_array()
                .ok_or_else(|| KahootError::ValidationError(format!("Expected a list of choices for {}", kind)))?
                .iter()
                .map(|v| {
                    v.as_u64()
                        .map(|i| i as usize)
                        .ok_or_else(|| KahootError::ValidationError(format!("Invalid choice index {}", v)))
                })
                .collect()
        };

        match kind {
            QuestionKind::Jumble => Ok(Self::Order(indices(value)?)),
            QuestionKind::MultipleSelectQuiz => Ok(Self::Selection(indices(value)?)),
            QuestionKind::OpenEnded | QuestionKind::WordCloud => match value {
                Value::String(text) => Ok(Self::Text(text.clone())),
                other => Ok(Self::Text(other.to_string())),
            },
            _ => match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(|i| Self::Index(i as usize))
                    .ok_or_else(|| KahootError::ValidationError(format!("Invalid choice index {}", n))),
                Value::Array(_) => Ok(Self::Selection(indices(value)?)),
                Value::String(text) => Ok(Self::Text(text.clone())),
                other => Err(KahootError::ValidationError(format!("Unsupported answer {}", other))),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Index(i) => json!(i),
            Self::Order(v) | Self::Selection(v) => json!(v),
            Self::Text(t) => json!(t),
        }
    }

    fn indices(&self) -> Option<&[usize]> {
        match self {
            Self::Order(v) | Self::Selection(v) => Some(v),
            _ => None,
        }
    }
}

/// Adjustments applied on top of the computed outcome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerOverrides {
    pub force_correct: bool,
    /// Replaces the time-decayed raw points
    pub points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub correct: bool,
    pub text: String,
    /// Index reported to the service; -1 when no single choice applies
    pub choice_index: i64,
    /// Share of the correct choices that were picked; 1.0 or 0.0 for kinds
    /// without partial credit
    pub percent_correct: f64,
}

fn choice_answer(question: &Question, index: usize) -> Result<&str> {
    question
        .choices
        .get(index)
        .map(|c| c.answer.as_str())
        .ok_or_else(|| {
            KahootError::ValidationError(format!(
                "Choice {} out of range ({} choices)",
                index,
                question.choices.len()
            ))
        })
}

fn joined_answers(question: &Question, indices: &[usize]) -> Result<String> {
    let answers = indices
        .iter()
        .map(|&i| choice_answer(question, i))
        .collect::<Result<Vec<_>>>()?;
    Ok(answers.join("|"))
}

fn mismatch(question: &Question, submission: &Submission) -> KahootError {
    KahootError::ValidationError(format!(
        "Submission {:?} does not fit a {} question",
        submission, question.kind
    ))
}

pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !STRIPPED_PUNCTUATION.contains(c)).collect()
}

/// Emoji and other pictographs: anything outside ASCII that is neither a
/// letter, a digit nor whitespace
fn is_decorative(c: char) -> bool {
    !c.is_ascii() && !c.is_alphanumeric() && !c.is_whitespace()
}

pub fn strip_decorative(text: &str) -> String {
    text.chars().filter(|c| !is_decorative(*c)).collect()
}

fn open_ended_match(stripped: &str, candidate: &str) -> bool {
    let readable = strip_decorative(candidate);
    if readable.is_empty() {
        stripped == candidate
    } else {
        strip_decorative(stripped).to_lowercase() == strip_punctuation(&readable).to_lowercase()
    }
}

/// Judge a submission. Pure: the same inputs always give the same outcome.
pub fn evaluate(
    question: &Question,
    submission: &Submission,
    overrides: &AnswerOverrides,
) -> Result<Evaluation> {
    let mut evaluation = match &question.kind {
        QuestionKind::Quiz => {
            let index = match submission {
                Submission::Index(i) => *i,
                other => return Err(mismatch(question, other)),
            };
            let text = choice_answer(question, index)?.to_string();
            let correct = question.choices[index].correct;
            Evaluation {
                correct,
                text,
                choice_index: index as i64,
                percent_correct: if correct { 1.0 } else { 0.0 },
            }
        }
        QuestionKind::Jumble => {
            let order = submission
                .indices()
                .ok_or_else(|| mismatch(question, submission))?;
            let text = joined_answers(question, order)?;
            // Choices are served unshuffled, so the identity order is the answer
            let correct = order.iter().enumerate().all(|(pos, &i)| pos == i)
                && order.len() == question.choices.len();
            Evaluation {
                correct,
                text,
                choice_index: -1,
                percent_correct: if correct { 1.0 } else { 0.0 },
            }
        }
        QuestionKind::MultipleSelectQuiz => {
            let selection = submission
                .indices()
                .ok_or_else(|| mismatch(question, submission))?;
            let text = joined_answers(question, selection)?;
            let total_correct = question.choices.iter().filter(|c| c.correct).count();

            let mut correct = false;
            let mut correct_count = 0usize;
            for &i in selection {
                if question.choices[i].correct {
                    correct = true;
                    correct_count += 1;
                } else {
                    correct = false;
                    break;
                }
            }
            let percent_correct = if total_correct == 0 {
                0.0
            } else {
                correct_count as f64 / total_correct as f64
            };
            Evaluation {
                correct,
                text,
                choice_index: -1,
                percent_correct,
            }
        }
        QuestionKind::OpenEnded => {
            let text = match submission {
                Submission::Text(t) => t.clone(),
                Submission::Index(i) => i.to_string(),
                other => return Err(mismatch(question, other)),
            };
            let stripped = strip_punctuation(&text);
            let matched = question
                .choices
                .iter()
                .position(|c| open_ended_match(&stripped, &c.answer));
            Evaluation {
                correct: matched.is_some(),
                text,
                choice_index: matched.map(|i| i as i64).unwrap_or(-1),
                percent_correct: if matched.is_some() { 1.0 } else { 0.0 },
            }
        }
        QuestionKind::WordCloud => {
            let text = match submission {
                Submission::Text(t) => t.clone(),
                other => return Err(mismatch(question, other)),
            };
            Evaluation {
                correct: true,
                text,
                choice_index: -1,
                percent_correct: 1.0,
            }
        }
        QuestionKind::Other(_) => {
            let choice_index = match submission {
                Submission::Index(i) => *i as i64,
                _ => 0,
            };
            Evaluation {
                correct: true,
                text: String::new(),
                choice_index,
                percent_correct: 1.0,
            }
        }
    };

    if overrides.force_correct {
        evaluation.correct = true;
    }
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::models::Choice;

    fn question(kind: QuestionKind, choices: &[(&str, bool)]) -> Question {
        Question {
            kind,
            question: Some("Q".to_string()),
            time: 20_000,
            points: None,
            points_multiplier: 1.0,
            choices: choices
                .iter()
                .map(|(a, c)| Choice {
                    answer: a.to_string(),
                    correct: *c,
                })
                .collect(),
            layout: None,
            question_format: None,
            video: None,
        }
    }

    #[test]
    fn test_quiz() {
        let q = question(QuestionKind::Quiz, &[("Paris", true), ("Rome", false)]);
        let eval = evaluate(&q, &Submission::Index(0), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.text, "Paris");
        assert_eq!(eval.choice_index, 0);

        let eval = evaluate(&q, &Submission::Index(1), &AnswerOverrides::default()).unwrap();
        assert!(!eval.correct);
    }

    #[test]
    fn test_quiz_out_of_range_is_rejected() {
        let q = question(QuestionKind::Quiz, &[("Paris", true)]);
        let result = evaluate(&q, &Submission::Index(4), &AnswerOverrides::default());
        assert!(matches!(result, Err(KahootError::ValidationError(_))));
    }

    #[test]
    fn test_jumble() {
        let q = question(
            QuestionKind::Jumble,
            &[("a", true), ("b", true), ("c", true), ("d", true)],
        );
        let eval = evaluate(&q, &Submission::Order(vec![0, 1, 2, 3]), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.text, "a|b|c|d");
        assert_eq!(eval.choice_index, -1);

        let eval = evaluate(&q, &Submission::Order(vec![1, 0, 2, 3]), &AnswerOverrides::default()).unwrap();
        assert!(!eval.correct);
        assert_eq!(eval.text, "b|a|c|d");
    }

    #[test]
    fn test_multiple_select_partial() {
        let q = question(
            QuestionKind::MultipleSelectQuiz,
            &[("a", true), ("b", true), ("c", false)],
        );
        let eval = evaluate(&q, &Submission::Selection(vec![1]), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.percent_correct, 0.5);
        assert_eq!(eval.choice_index, -1);

        let eval = evaluate(&q, &Submission::Selection(vec![0, 2, 1]), &AnswerOverrides::default()).unwrap();
        assert!(!eval.correct);
        assert_eq!(eval.text, "a|c|b");
    }

    #[test]
    fn test_open_ended_normalization() {
        let q = question(
            QuestionKind::OpenEnded,
            &[("Mount Everest", true), ("🗻", true)],
        );
        let eval = evaluate(&q, &Submission::Text("mount everest!".to_string()), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.choice_index, 0);
        assert_eq!(eval.text, "mount everest!");

        let eval = evaluate(&q, &Submission::Text("🗻".to_string()), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.choice_index, 1);

        let eval = evaluate(&q, &Submission::Text("K2".to_string()), &AnswerOverrides::default()).unwrap();
        assert!(!eval.correct);
        assert_eq!(eval.choice_index, -1);
    }

    #[test]
    fn test_word_cloud_and_unknown() {
        let q = question(QuestionKind::WordCloud, &[]);
        let eval = evaluate(&q, &Submission::Text("anything".to_string()), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.choice_index, -1);

        let q = question(QuestionKind::Other("survey".to_string()), &[("x", false)]);
        let eval = evaluate(&q, &Submission::Index(2), &AnswerOverrides::default()).unwrap();
        assert!(eval.correct);
        assert_eq!(eval.choice_index, 2);
        let eval = evaluate(&q, &Submission::Text("x".to_string()), &AnswerOverrides::default()).unwrap();
        assert_eq!(eval.choice_index, 0);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let q = question(QuestionKind::Quiz, &[("a", false), ("b", true)]);
        let first = evaluate(&q, &Submission::Index(1), &AnswerOverrides::default()).unwrap();
        let second = evaluate(&q, &Submission::Index(1), &AnswerOverrides::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_force_correct_override() {
        let q = question(QuestionKind::Quiz, &[("a", false)]);
        let overrides = AnswerOverrides {
            force_correct: true,
            points: None,
        };
        assert!(evaluate(&q, &Submission::Index(0), &overrides).unwrap().correct);
    }

    #[test]
    fn test_submission_from_frame_value() {
        assert_eq!(
            Submission::from_value(&QuestionKind::Jumble, &json!([3, 2, 1, 0])).unwrap(),
            Submission::Order(vec![3, 2, 1, 0])
        );
        assert_eq!(
            Submission::from_value(&QuestionKind::Quiz, &json!(2)).unwrap(),
            Submission::Index(2)
        );
        assert!(Submission::from_value(&QuestionKind::MultipleSelectQuiz, &json!(2)).is_err());
    }
}
