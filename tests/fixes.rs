//! Fix scenarios driven to convergence

use pretty_assertions::assert_eq;
use tasklint::{
    Cancellation, CompilerHost, DiagnosticId, Driver, DriverError, DriverOptions, FixSafety,
    SourceHost,
};

fn fix_with(src: &str, options: DriverOptions) -> Result<tasklint::FixOutcome, DriverError> {
    let host = SourceHost::default();
    Driver::new(&host)
        .with_options(options)
        .run(src, &Cancellation::new())
}

/// Fix `src` with safe fixes and check the result compiles without
/// anything new
fn fix(src: &str) -> String {
    let outcome = fix_with(src, DriverOptions::default()).unwrap();
    let host = SourceHost::default();
    let before = host.compile(src, &Cancellation::new()).unwrap();
    let after = host.compile(&outcome.text, &Cancellation::new()).unwrap();
    assert!(after.diagnostics().len() <= before.diagnostics().len());
    outcome.text
}

#[test]
fn test_handler_and_token_fixes_converge() {
    let src = "using System.Threading;
using System.Threading.Tasks;
using NServiceBus;

namespace Shop
{
    class OrderPlaced { }

    class OrderHandler : IHandleMessages<OrderPlaced>
    {
        Task Save(OrderPlaced order, CancellationToken token) => Task.CompletedTask;
    }
}
";
    let expected = "using System.Threading;
using System.Threading.Tasks;
using NServiceBus;

namespace Shop
{
    class OrderPlaced { }

    class OrderHandler : IHandleMessages<OrderPlaced>
    {
        Task Save(OrderPlaced order, CancellationToken token = default) => Task.CompletedTask;

        public async Task Handle(OrderPlaced message, IMessageHandlerContext context)
        {
        }
    }
}
";
    assert_eq!(fix(src), expected);
}

#[test]
fn test_fix_is_idempotent() {
    let src = "using System.Threading;
using NServiceBus;

class Placed { }
class Shipped { }

class Saga : IAmStartedByMessages<Placed>, IHandleMessages<Shipped>
{
    void Tick(CancellationToken a, CancellationToken b) { }
}
";
    let first = fix(src);
    assert!(first.contains("void Tick(CancellationToken a = default, CancellationToken b = default)"));
    assert!(first.contains("System.Threading.Tasks.Task Handle(Placed message, IMessageHandlerContext context)"));
    assert!(first.contains("System.Threading.Tasks.Task Handle(Shipped message, IMessageHandlerContext context)"));

    let outcome = fix_with(&first, DriverOptions::default()).unwrap();
    assert_eq!(outcome.text, first);
    assert_eq!(outcome.iterations, 0);
    assert!(outcome.remaining.is_empty());
}

#[test]
fn test_unsafe_fix_applies_only_when_enabled() {
    let src = "using System.Threading;
using System.Threading.Tasks;

public class Api
{
    public Task Send(string body, CancellationToken token = default) => Task.CompletedTask;
}
";
    let safe = fix_with(src, DriverOptions::default()).unwrap();
    assert_eq!(safe.text, src);
    assert_eq!(
        safe.remaining[0].rule_id,
        DiagnosticId::CancellationTokenNonPrivateRequired
    );

    let outcome = fix_with(
        src,
        DriverOptions {
            unsafe_fixes: true,
            ..DriverOptions::default()
        },
    )
    .unwrap();
    assert!(outcome
        .text
        .contains("public Task Send(string body, CancellationToken token) =>"));
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].safety, FixSafety::Unsafe);
    assert_eq!(
        outcome.applied[0].equivalence_key,
        "MakeCancellationTokenRequired"
    );
}

#[test]
fn test_fix_that_breaks_a_caller_is_rejected() {
    let src = "using System.Threading;
using System.Threading.Tasks;

public class Api
{
    public Task Send(CancellationToken token = default) => Task.CompletedTask;

    Task Retry() => Send();
}
";
    let result = fix_with(
        src,
        DriverOptions {
            unsafe_fixes: true,
            ..DriverOptions::default()
        },
    );
    match result {
        Err(DriverError::Regression { fix, introduced }) => {
            assert_eq!(fix, "Make 'token' required");
            assert_eq!(introduced[0].code, "CS1501");
        }
        other => panic!("expected a regression, got {:?}", other.map(|o| o.text)),
    }
}

#[test]
fn test_declined_fix_leaves_diagnostic() {
    let src = "using System.Threading;

class Queue
{
    void Drain(CancellationToken token, int max) { }
}
";
    let outcome = fix_with(src, DriverOptions::default()).unwrap();
    assert_eq!(outcome.text, src);
    assert_eq!(outcome.remaining.len(), 1);
    assert_eq!(
        outcome.remaining[0].rule_id,
        DiagnosticId::CancellationTokenPrivateOptional
    );
}

#[test]
fn test_iteration_cap_reports_non_convergence() {
    let src = "using NServiceBus;
class A { }
class B { }
class C { }
class H : IHandleMessages<A>, IHandleMessages<B>, IHandleMessages<C> { }
";
    let result = fix_with(
        src,
        DriverOptions {
            max_iterations: 2,
            ..DriverOptions::default()
        },
    );
    assert!(matches!(
        result,
        Err(DriverError::NotConverged { iterations: 2 })
    ));

    let outcome = fix_with(src, DriverOptions::default()).unwrap();
    assert_eq!(outcome.iterations, 3);
}

#[test]
fn test_cancellation_stops_the_driver() {
    let host = SourceHost::default();
    let cancel = Cancellation::new();
    cancel.cancel();
    let result = Driver::new(&host).run("class H : IHandleMessages<A> { }", &cancel);
    assert!(matches!(result, Err(DriverError::Cancelled(_))));
}
