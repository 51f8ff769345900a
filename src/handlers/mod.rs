pub mod attempt_handler;

pub use attempt_handler::{
    health_check, health_check_ready, leaderboard, live_questions, my_attempts, result_analysis,
    start_attempt, submit_question, submit_test, visit_question,
};
