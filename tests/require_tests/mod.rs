use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rexxkit::{
    address::{handler_fn, HandlerResponse},
    eval::ErrorKind,
    functions::FunctionEntry,
    library::{
        LibraryDescriptor, LibraryResolver, LibraryType, LoadRequest, LoadedModule,
        ResolutionError, StaticResolver,
    },
    output::BufferSink,
    InterpreterSession, InterpreterState, Value,
};

use crate::support::{config, run_with};

fn greetings(loads: Arc<AtomicUsize>) -> StaticResolver {
    StaticResolver::new("registry").with_module("greetings", move || {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedModule::new(LibraryDescriptor::new(
            "greetings",
            "1.0.0",
            LibraryType::FunctionsLibrary,
        ))
        .with_function(
            "hello",
            FunctionEntry::native(|args| {
                let name = args.get(0).map(Value::to_string).unwrap_or_default();
                Ok(Value::from(format!("hi {}", name)))
            }),
        ))
    })
}

fn error_of(state: &InterpreterState) -> (ErrorKind, &str) {
    match state {
        InterpreterState::Error { kind, message, .. } => (*kind, message),
        other => panic!("expected an error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_require_is_cached() {
    let loads = Arc::new(AtomicUsize::new(0));
    let builder = InterpreterSession::builder().with_resolver(Arc::new(greetings(loads.clone())));
    let source = r#"
REQUIRE 'greetings'
REQUIRE 'greetings'
SAY hello('bob')
"#;
    let run = run_with(builder, source).await;
    assert_eq!(run.output, vec!["hi bob"]);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_outlives_a_run() {
    let loads = Arc::new(AtomicUsize::new(0));
    let output = Arc::new(BufferSink::new());
    let session = InterpreterSession::builder()
        .with_resolver(Arc::new(greetings(loads.clone())))
        .with_output(output.clone())
        .build()
        .unwrap();
    for _ in 0..2 {
        let outcome = session
            .execute("REQUIRE 'greetings'\nSAY hello('again')")
            .await
            .unwrap();
        assert_eq!(outcome.exit_status(), 0);
    }
    assert_eq!(output.lines(), vec!["hi again", "hi again"]);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(session.loader().loaded(), vec!["greetings".to_string()]);
}

#[tokio::test]
async fn test_alias_prefixes_functions() {
    let loads = Arc::new(AtomicUsize::new(0));
    let builder = InterpreterSession::builder().with_resolver(Arc::new(greetings(loads)));
    let source = r#"
REQUIRE 'greetings' AS g
SAY g.hello('ann')
SAY hello('ann')
"#;
    let run = run_with(builder, source).await;
    assert_eq!(run.output, vec!["hi ann"]);
    assert_eq!(
        error_of(&run.outcome.state),
        (ErrorKind::Evaluation, "unknown function HELLO")
    );
}

#[tokio::test]
async fn test_address_handler_library_with_alias() {
    let resolver = StaticResolver::new("registry").with_module("db-lib", || {
        Ok(LoadedModule::new(
            LibraryDescriptor::new("db", "2.1", LibraryType::AddressHandler).with_address_target("DB"),
        )
        .with_handler(handler_fn(|call, context| {
            Ok(HandlerResponse::ok(format!("{} via {}", call.describe(), context.address)))
        })))
    });
    let output = Arc::new(BufferSink::new());
    let session = InterpreterSession::builder()
        .with_resolver(Arc::new(resolver))
        .with_output(output.clone())
        .build()
        .unwrap();
    let source = r#"
REQUIRE 'db-lib' AS store
ADDRESS store
'ping'
SAY RESULT
"#;
    let outcome = session.execute(source).await.unwrap();
    assert_eq!(outcome.exit_status(), 0, "{:?}", outcome.state);
    assert_eq!(output.lines(), vec!["command 'ping' via STORE"]);
    assert!(session.addresses().contains("STORE"));
    assert!(!session.addresses().contains("DB"));
}

#[tokio::test]
async fn test_dependencies_load_first_and_cycles_fail() {
    let loads = Arc::new(AtomicUsize::new(0));
    let resolver = greetings(loads.clone())
        .with_module("app", || {
            Ok(LoadedModule::new(
                LibraryDescriptor::new("app", "1", LibraryType::FunctionsLibrary)
                    .with_dependency("greetings"),
            ))
        })
        .with_module("a", || {
            Ok(LoadedModule::new(
                LibraryDescriptor::new("a", "1", LibraryType::FunctionsLibrary).with_dependency("b"),
            ))
        })
        .with_module("b", || {
            Ok(LoadedModule::new(
                LibraryDescriptor::new("b", "1", LibraryType::FunctionsLibrary).with_dependency("a"),
            ))
        });
    let builder = InterpreterSession::builder().with_resolver(Arc::new(resolver));
    let source = r#"
REQUIRE 'app'
SAY hello('dep')
SIGNAL ON ERROR
REQUIRE 'a'
EXIT
error:
SAY 'trapped'
"#;
    let run = run_with(builder, source).await;
    assert_eq!(run.output, vec!["hi dep"]);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    let (kind, message) = error_of(&run.outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("a -> b -> a"), "{}", message);
}

#[tokio::test]
async fn test_unresolved_and_invalid_libraries() {
    let resolver = StaticResolver::new("registry").with_module("broken", || {
        Ok(LoadedModule::new(LibraryDescriptor::new(
            "broken",
            "",
            LibraryType::FunctionsLibrary,
        )))
    });
    let builder = InterpreterSession::builder().with_resolver(Arc::new(resolver));
    let run = run_with(builder, "REQUIRE 'missing'").await;
    let (kind, message) = error_of(&run.outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("missing"), "{}", message);

    let resolver = StaticResolver::new("registry").with_module("broken", || {
        Ok(LoadedModule::new(LibraryDescriptor::new(
            "broken",
            "",
            LibraryType::FunctionsLibrary,
        )))
    });
    let builder = InterpreterSession::builder().with_resolver(Arc::new(resolver));
    let run = run_with(builder, "REQUIRE 'broken'").await;
    let (kind, message) = error_of(&run.outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("missing version"), "{}", message);
}

#[tokio::test]
async fn test_conflicting_function_names() {
    let resolver = StaticResolver::new("registry").with_module("shadow", || {
        Ok(
            LoadedModule::new(LibraryDescriptor::new("shadow", "1", LibraryType::FunctionsLibrary))
                .with_function("length", FunctionEntry::native(|_| Ok(Value::from(0)))),
        )
    });
    let builder = InterpreterSession::builder().with_resolver(Arc::new(resolver));
    let run = run_with(builder, "REQUIRE 'shadow'").await;
    let (kind, message) = error_of(&run.outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("LENGTH"), "{}", message);
}

/// Answers from `inner` after a pause, like a slow registry.
struct SlowResolver {
    delay: Duration,
    inner: StaticResolver,
}

#[async_trait]
impl LibraryResolver for SlowResolver {
    fn name(&self) -> &str {
        "slow"
    }

    async fn resolve(
        &self,
        request: &LoadRequest,
        session: &InterpreterSession,
    ) -> Result<Option<LoadedModule>, ResolutionError> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve(request, session).await
    }
}

#[tokio::test]
async fn test_require_timeout_is_not_trapped() {
    let loads = Arc::new(AtomicUsize::new(0));
    let resolver = SlowResolver {
        delay: Duration::from_secs(10),
        inner: greetings(loads.clone()),
    };
    let builder = InterpreterSession::builder()
        .with_config(config(|c| c.require_timeout = Some(Duration::from_millis(20))))
        .with_resolver(Arc::new(resolver));
    let source = r#"
SIGNAL ON ERROR
REQUIRE 'greetings'
SAY 'loaded'
EXIT

error:
  SAY 'trapped'
"#;
    let run = run_with(builder, source).await;
    let (kind, message) = error_of(&run.outcome.state);
    assert_eq!(kind, ErrorKind::Timeout);
    assert!(message.contains("REQUIRE greetings"), "{}", message);
    assert!(run.output.is_empty(), "{:?}", run.output);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_first_resolver_that_answers_wins() {
    let first_loads = Arc::new(AtomicUsize::new(0));
    let second_loads = Arc::new(AtomicUsize::new(0));
    let second = {
        let loads = second_loads.clone();
        StaticResolver::new("mirror").with_module("greetings", move || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedModule::new(LibraryDescriptor::new(
                "greetings",
                "9.9.9",
                LibraryType::FunctionsLibrary,
            ))
            .with_function("hello", FunctionEntry::native(|_| Ok(Value::from("from the mirror")))))
        })
    };
    let builder = InterpreterSession::builder()
        .with_resolver(Arc::new(greetings(first_loads.clone())))
        .with_resolver(Arc::new(second));
    let run = run_with(builder, "REQUIRE 'greetings'\nSAY hello('ann')").await;
    assert_eq!(run.output, vec!["hi ann"]);
    assert_eq!(first_loads.load(Ordering::SeqCst), 1);
    assert_eq!(second_loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_library_leaves_nothing_registered() {
    let resolver = StaticResolver::new("registry").with_module("db-lib", || {
        let status = || FunctionEntry::native(|_| Ok(Value::from("up")));
        Ok(LoadedModule::new(
            LibraryDescriptor::new("db", "2.1", LibraryType::AddressHandler).with_address_target("DB"),
        )
        .with_function("status", status())
        .with_function("ping", FunctionEntry::native(|_| Ok(Value::from("pong"))))
        .with_function("STATUS", status())
        .with_handler(handler_fn(|_, _| Ok(HandlerResponse::ok("done")))))
    });
    let output = Arc::new(BufferSink::new());
    let session = InterpreterSession::builder()
        .with_resolver(Arc::new(resolver))
        .with_output(output.clone())
        .build()
        .unwrap();
    let outcome = session.execute("REQUIRE 'db-lib'").await.unwrap();
    let (kind, message) = error_of(&outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("STATUS"), "{}", message);
    assert!(!session.addresses().contains("DB"));
    assert!(!session.functions().contains("STATUS"));
    assert!(!session.functions().contains("PING"));
    assert!(session.loader().loaded().is_empty());
}

const MATHLIB: &str = r#"-- arithmetic helpers
loaded = 1

MATHLIB_META:
  RETURN <<JSON
  {"name": "mathlib", "version": 1, "type": "functions-library"}
  JSON

double:
  PARSE ARG n
  RETURN n * 2

square:
  PARSE ARG n
  RETURN n * n
"#;

const SHOUTER: &str = r#"SHOUTER_META:
  RETURN <<JSON
  {
    "name": "shouter",
    "version": "0.1",
    "type": "address-handler",
    "provides": {"addressTarget": "SHOUT", "handlerFunction": "shout"}
  }
  JSON

shout:
  PARSE ARG command
  RETURN UPPER(command) || '!'
"#;

#[tokio::test]
async fn test_local_script_libraries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mathlib.rexx"), MATHLIB).unwrap();
    std::fs::create_dir(dir.path().join("libs")).unwrap();
    std::fs::write(dir.path().join("libs").join("shouter.rexx"), SHOUTER).unwrap();
    let main = dir.path().join("main.rexx");
    std::fs::write(
        &main,
        r#"REQUIRE './mathlib.rexx'
REQUIRE './libs/shouter' AS loud
SAY double(21) square(3)
ADDRESS loud
'hello'
SAY RESULT
"#,
    )
    .unwrap();

    let output = Arc::new(BufferSink::new());
    let session = InterpreterSession::builder()
        .with_output(output.clone())
        .build()
        .unwrap();
    let outcome = session.execute_file(&main).await.unwrap();
    assert_eq!(outcome.exit_status(), 0, "{:?}", outcome.state);
    assert_eq!(output.lines(), vec!["42 9", "HELLO!"]);

    let registration = session.loader().cached("./mathlib.rexx").unwrap();
    assert_eq!(registration.descriptor.version, "1");
    assert_eq!(
        registration.functions,
        vec!["DOUBLE".to_string(), "SQUARE".to_string()]
    );
}

#[tokio::test]
async fn test_local_library_without_meta() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plain.rexx"), "helper:\n  RETURN 1\n").unwrap();
    let main = dir.path().join("main.rexx");
    std::fs::write(&main, "REQUIRE './plain.rexx'\n").unwrap();

    let session = InterpreterSession::builder()
        .with_output(Arc::new(BufferSink::new()))
        .build()
        .unwrap();
    let outcome = session.execute_file(&main).await.unwrap();
    let (kind, message) = error_of(&outcome.state);
    assert_eq!(kind, ErrorKind::Resolution);
    assert!(message.contains("_META"), "{}", message);
}

#[tokio::test]
async fn test_exit_in_library_routine_returns_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("guard.rexx"),
        r#"GUARD_META:
  RETURN <<JSON
  {"name": "guard", "version": "1", "type": "functions-library"}
  JSON

check:
  PARSE ARG n
  IF n < 0 THEN EXIT 'negative'
  RETURN 'ok'
"#,
    )
    .unwrap();
    let main = dir.path().join("main.rexx");
    std::fs::write(
        &main,
        "REQUIRE './guard.rexx'\nSAY check(-1)\nSAY check(2)\nSAY 'after'\n",
    )
    .unwrap();

    let output = Arc::new(BufferSink::new());
    let session = InterpreterSession::builder()
        .with_output(output.clone())
        .build()
        .unwrap();
    let outcome = session.execute_file(&main).await.unwrap();
    assert_eq!(outcome.state, InterpreterState::Exited(0));
    assert_eq!(output.lines(), vec!["negative", "ok", "after"]);
}
