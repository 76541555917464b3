use chrono::Duration;
use quiz_core::model::{ExternalId, NewQuiz, Quiz, QuizRequest, UserId};
use quiz_core::time::fixed_now;
use storage::repository::{AnswerDraft, QuizRepository, ResultRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_quiz(repo: &SqliteRepository, owner: u64, ids: &[&str]) -> Quiz {
    let request = QuizRequest::new(UserId::new(owner), "Literature", "books", ids.len(), 30).unwrap();
    let external = ids.iter().map(|id| ExternalId::new(*id).unwrap()).collect();
    let quiz = NewQuiz::from_request(&request, external, fixed_now()).unwrap();
    repo.create_quiz(&quiz).await.expect("create quiz")
}

#[tokio::test]
async fn sqlite_quiz_roundtrip_keeps_question_order() {
    let repo = connect("memdb_quiz_roundtrip").await;
    let created = seed_quiz(&repo, 1, &["ef01.2/3", "abc17/5", "0"]).await;

    let fetched = repo
        .get_quiz(created.id())
        .await
        .unwrap()
        .expect("quiz exists");
    assert_eq!(fetched, created);
    let order: Vec<&str> = fetched
        .questions()
        .iter()
        .map(|q| q.external_id.as_str())
        .collect();
    assert_eq!(order, vec!["ef01.2/3", "abc17/5", "0"]);
    assert_eq!(fetched.created_at(), fixed_now());

    // migrations are idempotent
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn sqlite_lists_quizzes_per_owner_in_pages() {
    let repo = connect("memdb_quiz_pages").await;
    for _ in 0..23 {
        seed_quiz(&repo, 5, &["q/1"]).await;
    }
    seed_quiz(&repo, 6, &["q/1"]).await;

    let (total, page) = repo.list_quizzes(UserId::new(5), 4, 5).await.unwrap();
    assert_eq!(total, 23);
    assert_eq!(page.len(), 3);
    assert!(page.iter().all(|q| q.owner() == UserId::new(5)));

    let (other_total, _) = repo.list_quizzes(UserId::new(6), 0, 5).await.unwrap();
    assert_eq!(other_total, 1);
}

#[tokio::test]
async fn sqlite_run_lifecycle_scores_and_completes() {
    let repo = connect("memdb_run_lifecycle").await;
    let quiz = seed_quiz(&repo, 1, &["a/1", "a/2", "a/3"]).await;
    let qs = quiz.questions();
    let run = repo
        .create_result(quiz.id(), UserId::new(42), fixed_now())
        .await
        .unwrap();

    let first = repo
        .upsert_answer(run, &AnswerDraft::new(qs[0].id, "nope", false))
        .await
        .unwrap();
    let again = repo
        .upsert_answer(run, &AnswerDraft::new(qs[0].id, "Right", true))
        .await
        .unwrap();
    assert_eq!(first, again);
    repo.upsert_answer(run, &AnswerDraft::new(qs[1].id, "wrong", false))
        .await
        .unwrap();

    let done_at = fixed_now() + Duration::minutes(3);
    let result = repo
        .finish_result(run, Some(&AnswerDraft::new(qs[2].id, "x", false)), 3, done_at)
        .await
        .unwrap();
    assert_eq!(result.score.value(), 33);
    assert_eq!(result.completed_at, Some(done_at));
    assert_eq!(result.answers.len(), 3);
    assert_eq!(result.answers[0].text, "Right");

    let incorrect = repo.list_incorrect_answers(run).await.unwrap();
    let order: Vec<_> = incorrect.iter().map(|a| a.question_id).collect();
    assert_eq!(order, vec![qs[1].id, qs[2].id]);

    assert!(matches!(
        repo.finish_result(run, None, 3, done_at).await,
        Err(StorageError::Conflict)
    ));
}

#[tokio::test]
async fn sqlite_set_score_floors() {
    let repo = connect("memdb_set_score").await;
    let quiz = seed_quiz(&repo, 1, &["a/1"]).await;
    let run = repo
        .create_result(quiz.id(), UserId::new(1), fixed_now())
        .await
        .unwrap();

    assert_eq!(repo.set_score(run, 7, 10).await.unwrap().value(), 70);
    assert_eq!(repo.set_score(run, 1, 3).await.unwrap().value(), 33);
    let stored = repo.get_result(run).await.unwrap().unwrap();
    assert_eq!(stored.score.value(), 33);

    repo.set_completion_time(run, fixed_now()).await.unwrap();
    let stored = repo.get_result(run).await.unwrap().unwrap();
    assert!(stored.is_complete());
}

#[tokio::test]
async fn sqlite_failed_finish_rolls_back() {
    let repo = connect("memdb_finish_rollback").await;
    let quiz = seed_quiz(&repo, 1, &["a/1", "a/2"]).await;
    let qs = quiz.questions();
    let run = repo
        .create_result(quiz.id(), UserId::new(1), fixed_now())
        .await
        .unwrap();

    // a zero total cannot be scored, so the upserted answer must not stick
    let err = repo
        .finish_result(run, Some(&AnswerDraft::new(qs[1].id, "x", true)), 0, fixed_now())
        .await;
    assert!(matches!(err, Err(StorageError::Score(_))));

    let stored = repo.get_result(run).await.unwrap().unwrap();
    assert!(stored.answers.is_empty());
    assert!(!stored.is_complete());
}

#[tokio::test]
async fn sqlite_accept_answer_rescores_once() {
    let repo = connect("memdb_accept").await;
    let quiz = seed_quiz(&repo, 1, &["a/1", "a/2"]).await;
    let qs = quiz.questions();
    let run = repo
        .create_result(quiz.id(), UserId::new(1), fixed_now())
        .await
        .unwrap();
    let wrong = repo
        .upsert_answer(run, &AnswerDraft::new(qs[0].id, "x", false))
        .await
        .unwrap();
    repo.finish_result(run, Some(&AnswerDraft::new(qs[1].id, "y", true)), 2, fixed_now())
        .await
        .unwrap();

    let accepted = repo.accept_answer(run, wrong, 2).await.unwrap();
    assert!(accepted.changed);
    assert_eq!(accepted.correct, 2);
    assert!(accepted.score.is_perfect());

    let repeat = repo.accept_answer(run, wrong, 2).await.unwrap();
    assert!(!repeat.changed);
    assert_eq!(repeat.correct, 2);
    assert!(repo.list_incorrect_answers(run).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_delete_cascades() {
    let repo = connect("memdb_delete_cascade").await;
    let quiz = seed_quiz(&repo, 1, &["a/1"]).await;
    let run = repo
        .create_result(quiz.id(), UserId::new(1), fixed_now())
        .await
        .unwrap();
    repo.upsert_answer(run, &AnswerDraft::new(quiz.questions()[0].id, "x", false))
        .await
        .unwrap();

    repo.delete_quiz(quiz.id()).await.unwrap();
    assert!(repo.get_quiz(quiz.id()).await.unwrap().is_none());
    assert!(repo.get_result(run).await.unwrap().is_none());
    assert!(matches!(
        repo.delete_quiz(quiz.id()).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.create_result(quiz.id(), UserId::new(1), fixed_now()).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_file_database_uses_wal() {
    let dir = std::env::temp_dir().join(format!("quiz-wal-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("quiz.sqlite3");
    let repo = SqliteRepository::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode;")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    repo.pool().close().await;
    let _ = std::fs::remove_dir_all(&dir);
}
