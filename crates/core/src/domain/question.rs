//! Insurer-agnostic underwriting questions.
//!
//! Questions come from the catalog service, are answered by the caller, and
//! only some of them are required: a child question is required when its
//! parent's given answer matches `parent_answer`. Requiredness is resolved
//! over the parent graph once every answer has been loaded, so a child never
//! sees a parent default that the caller overrode.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::{AnswerId, InsurerId, QuestionId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "Yes/No")]
    YesNo,
    #[serde(rename = "Checkboxes")]
    Checkboxes,
    #[serde(rename = "Select List")]
    SelectList,
    #[serde(rename = "Text - Single Line")]
    TextSingle,
    #[serde(rename = "Text - Multiple Lines")]
    TextMulti,
}

impl QuestionType {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::TextSingle | Self::TextMulti)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAnswer {
    pub id: AnswerId,
    pub answer: String,
    #[serde(default)]
    pub default: bool,
}

/// One question record as returned by the catalog service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuestion {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub parent: Option<QuestionId>,
    #[serde(default)]
    pub parent_answer: Option<AnswerId>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub insurers: Vec<InsurerId>,
    #[serde(default)]
    pub answers: Vec<CatalogAnswer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(AnswerId),
    Choices(Vec<AnswerId>),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub question_type: QuestionType,
    pub text: String,
    pub hint: Option<String>,
    pub parent: Option<QuestionId>,
    pub parent_answer: Option<AnswerId>,
    pub hidden: bool,
    pub insurers: BTreeSet<InsurerId>,
    pub possible_answers: BTreeMap<AnswerId, String>,
    answer: Option<Answer>,
    required: bool,
}

impl Question {
    /// Materializes a catalog record and applies any answer flagged as default.
    pub fn load(raw: CatalogQuestion) -> Self {
        let defaults: Vec<AnswerId> =
            raw.answers.iter().filter(|answer| answer.default).map(|answer| answer.id).collect();

        let answer = match raw.question_type {
            QuestionType::Checkboxes if !defaults.is_empty() => Some(Answer::Choices(defaults)),
            QuestionType::YesNo | QuestionType::SelectList => {
                defaults.first().copied().map(Answer::Choice)
            }
            _ => None,
        };

        Self {
            id: raw.id,
            question_type: raw.question_type,
            text: raw.text,
            hint: raw.hint,
            parent: raw.parent,
            parent_answer: raw.parent_answer,
            hidden: raw.hidden,
            insurers: raw.insurers.into_iter().collect(),
            possible_answers: raw
                .answers
                .into_iter()
                .map(|answer| (answer.id, answer.answer))
                .collect(),
            answer,
            required: false,
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.answer.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Type-checks a caller-supplied answer and stores it in the shape of this question type.
    pub fn set_answer(&mut self, value: &Value) -> Result<(), DomainError> {
        if value.is_null() {
            self.answer = None;
            return Ok(());
        }

        let answer = match self.question_type {
            QuestionType::Checkboxes => {
                let ids = self.parse_checkbox_ids(value)?;
                if let Some(unknown) = ids.iter().find(|id| !self.possible_answers.contains_key(id))
                {
                    return Err(self.invalid(format!("answer {unknown} is not a possible answer")));
                }
                Answer::Choices(ids)
            }
            QuestionType::YesNo | QuestionType::SelectList => {
                Answer::Choice(parse_answer_id(value).ok_or_else(|| {
                    self.invalid("answer must be a numeric answer id".to_string())
                })?)
            }
            QuestionType::TextSingle | QuestionType::TextMulti => match value {
                Value::String(text) => Answer::Text(text.trim().to_string()),
                Value::Number(number) => Answer::Text(number.to_string()),
                _ => return Err(self.invalid("answer must be text".to_string())),
            },
        };

        self.answer = Some(answer);
        Ok(())
    }

    fn parse_checkbox_ids(&self, value: &Value) -> Result<Vec<AnswerId>, DomainError> {
        let not_numeric = || self.invalid("checkbox answers must be numeric answer ids".to_string());
        match value {
            Value::String(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Value::String(raw) => raw
                .split('|')
                .map(|part| part.trim().parse::<u64>().map(AnswerId).map_err(|_| not_numeric()))
                .collect(),
            Value::Number(_) => parse_answer_id(value).map(|id| vec![id]).ok_or_else(not_numeric),
            Value::Array(items) => {
                items.iter().map(|item| parse_answer_id(item).ok_or_else(not_numeric)).collect()
            }
            _ => Err(not_numeric()),
        }
    }

    pub(crate) fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    /// Whether this question's current answer selects `expected`.
    pub fn has_answer(&self, expected: AnswerId) -> bool {
        match &self.answer {
            Some(Answer::Choice(id)) => *id == expected,
            Some(Answer::Choices(ids)) => ids.contains(&expected),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.required {
            return Ok(());
        }

        match &self.answer {
            None => Err(self.invalid("an answer is required".to_string())),
            Some(Answer::Text(text)) if text.is_empty() => {
                Err(self.invalid("an answer is required".to_string()))
            }
            Some(Answer::Text(_)) => Ok(()),
            Some(Answer::Choice(id)) if !self.possible_answers.contains_key(id) => {
                Err(self.invalid(format!("answer {id} is not a possible answer")))
            }
            Some(Answer::Choice(_)) => Ok(()),
            Some(Answer::Choices(ids)) if ids.is_empty() => {
                Err(self.invalid("at least one answer must be selected".to_string()))
            }
            Some(Answer::Choices(ids)) => {
                match ids.iter().find(|id| !self.possible_answers.contains_key(id)) {
                    Some(unknown) => {
                        Err(self.invalid(format!("answer {unknown} is not a possible answer")))
                    }
                    None => Ok(()),
                }
            }
        }
    }

    fn invalid(&self, reason: String) -> DomainError {
        DomainError::InvalidAnswer {
            question_id: self.id,
            text: format!("{} ({reason})", self.text),
        }
    }
}

fn parse_answer_id(value: &Value) -> Option<AnswerId> {
    match value {
        Value::Number(number) => number.as_u64().map(AnswerId),
        Value::String(raw) => raw.trim().parse::<u64>().ok().map(AnswerId),
        _ => None,
    }
}

/// All questions of one application, indexed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestionSet {
    questions: BTreeMap<QuestionId, Question>,
}

impl QuestionSet {
    /// Loads catalog records and the caller's answers. Requiredness is not computed here.
    pub fn from_catalog(
        records: Vec<CatalogQuestion>,
        answers: &HashMap<QuestionId, Value>,
    ) -> Result<Self, DomainError> {
        let mut questions = BTreeMap::new();
        for record in records {
            let mut question = Question::load(record);
            if let Some(value) = answers.get(&question.id) {
                question.set_answer(value)?;
            }
            questions.insert(question.id, question);
        }
        Ok(Self { questions })
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn required_ids(&self) -> Vec<QuestionId> {
        self.iter().filter(|question| question.is_required()).map(|question| question.id).collect()
    }

    /// Parents before children. Fails on a dangling parent reference or a parent cycle.
    pub fn evaluation_order(&self) -> Result<Vec<QuestionId>, DomainError> {
        let mut children: BTreeMap<QuestionId, Vec<QuestionId>> = BTreeMap::new();
        let mut queue = VecDeque::new();

        for question in self.questions.values() {
            match question.parent {
                Some(parent) if !self.questions.contains_key(&parent) => {
                    return Err(DomainError::CatalogIntegrity(format!(
                        "question {} references missing parent question {parent}",
                        question.id
                    )));
                }
                Some(parent) => children.entry(parent).or_default().push(question.id),
                None => queue.push_back(question.id),
            }
        }

        let mut order = Vec::with_capacity(self.questions.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(kids) = children.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }

        if order.len() != self.questions.len() {
            let placed: BTreeSet<QuestionId> = order.iter().copied().collect();
            let cyclic: Vec<String> = self
                .questions
                .keys()
                .filter(|id| !placed.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(DomainError::CatalogIntegrity(format!(
                "parent cycle detected among questions [{}]",
                cyclic.join(", ")
            )));
        }

        Ok(order)
    }

    pub fn resolve_requirements(&mut self) -> Result<(), DomainError> {
        for id in self.evaluation_order()? {
            let Some(question) = self.questions.get(&id) else {
                continue;
            };
            let required = !question.hidden
                && match (question.parent, question.parent_answer) {
                    (None, _) => true,
                    (Some(parent), Some(expected)) => self
                        .questions
                        .get(&parent)
                        .map(|parent| parent.has_answer(expected))
                        .unwrap_or(false),
                    (Some(_), None) => false,
                };
            if let Some(question) = self.questions.get_mut(&id) {
                question.set_required(required);
            }
        }
        Ok(())
    }

    /// First failing required question wins.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.questions.values().try_for_each(Question::validate)
    }
}
