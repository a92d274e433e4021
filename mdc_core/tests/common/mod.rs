#![allow(dead_code)]

pub mod seeded_radio;
