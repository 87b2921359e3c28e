// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded fallback question bank.
//!
//! Used whenever LLM generation fails. The bank is immutable, covers every
//! interview type across the easy/medium/hard range, and selection is fully
//! deterministic for a given (type, difficulty, count).

use intervo_core::types::{Difficulty, InterviewType, Question};

/// One bank entry: (text, category, difficulty, time limit seconds).
type BankEntry = (&'static str, &'static str, Difficulty, u32);

const TECHNICAL: &[BankEntry] = &[
    (
        "Explain the difference between a process and a thread.",
        "operating-systems",
        Difficulty::Easy,
        180,
    ),
    (
        "What happens when you type a URL into a browser and press enter?",
        "networking",
        Difficulty::Medium,
        300,
    ),
    (
        "How would you find a memory leak in a long-running service?",
        "debugging",
        Difficulty::Medium,
        300,
    ),
    (
        "Describe how a hash map handles collisions and when its worst case occurs.",
        "data-structures",
        Difficulty::Hard,
        420,
    ),
    (
        "Explain eventual consistency and when it is an acceptable trade-off.",
        "distributed-systems",
        Difficulty::Hard,
        420,
    ),
];

const BEHAVIORAL: &[BankEntry] = &[
    (
        "Tell me about a recent project you are proud of and your role in it.",
        "experience",
        Difficulty::Easy,
        240,
    ),
    (
        "Describe a time you disagreed with a teammate. How was it resolved?",
        "collaboration",
        Difficulty::Medium,
        300,
    ),
    (
        "Tell me about a time you missed a deadline. What did you change afterwards?",
        "accountability",
        Difficulty::Medium,
        300,
    ),
    (
        "Describe the hardest piece of critical feedback you have received.",
        "growth",
        Difficulty::Hard,
        360,
    ),
];

const CODING: &[BankEntry] = &[
    (
        "Write a function that reverses the words in a sentence in place.",
        "strings",
        Difficulty::Easy,
        600,
    ),
    (
        "Given a list of intervals, merge all overlapping intervals.",
        "arrays",
        Difficulty::Medium,
        900,
    ),
    (
        "Implement an LRU cache with O(1) get and put.",
        "design",
        Difficulty::Medium,
        900,
    ),
    (
        "Find the length of the longest substring without repeating characters.",
        "sliding-window",
        Difficulty::Hard,
        900,
    ),
];

const SYSTEM_DESIGN: &[BankEntry] = &[
    (
        "Design a URL shortening service.",
        "web-services",
        Difficulty::Easy,
        900,
    ),
    (
        "Design a rate limiter for a public API.",
        "infrastructure",
        Difficulty::Medium,
        900,
    ),
    (
        "Design a news feed that serves millions of users.",
        "scalability",
        Difficulty::Medium,
        1200,
    ),
    (
        "Design a distributed job scheduler with exactly-once execution.",
        "distributed-systems",
        Difficulty::Hard,
        1200,
    ),
];

fn entries_for(interview_type: InterviewType) -> &'static [BankEntry] {
    match interview_type {
        InterviewType::Technical => TECHNICAL,
        InterviewType::Behavioral => BEHAVIORAL,
        InterviewType::Coding => CODING,
        InterviewType::SystemDesign => SYSTEM_DESIGN,
    }
}

/// Select up to `count` bank questions for the given type and difficulty.
///
/// Entries matching the requested difficulty come first, then the rest in
/// bank order. Ids are assigned sequentially from 1.
pub fn select(
    interview_type: InterviewType,
    difficulty: Difficulty,
    count: usize,
) -> Vec<Question> {
    let entries = entries_for(interview_type);
    let mut ordered: Vec<&BankEntry> = entries
        .iter()
        .filter(|(_, _, d, _)| *d == difficulty)
        .collect();
    ordered.extend(entries.iter().filter(|(_, _, d, _)| *d != difficulty));

    ordered
        .into_iter()
        .take(count.max(1))
        .enumerate()
        .map(|(i, (text, category, difficulty, time_limit))| Question {
            id: i as u32 + 1,
            text: (*text).to_string(),
            category: (*category).to_string(),
            difficulty: *difficulty,
            interview_type,
            time_limit_seconds: *time_limit,
            allow_video: true,
            allow_audio: true,
            allow_text: true,
            hints: vec![],
            expected_points: vec![],
        })
        .collect()
}
