//! Conformance tests for the analyzers
//!
//! Fixtures mark every expected diagnostic with `[|...|]`. The markers are
//! stripped before compiling and the reported (id, span) list, ordered by
//! position, must match the marked spans.

use pretty_assertions::assert_eq;
use tasklint::{analyze, Cancellation, CompilerHost, DiagnosticId, LanguageFeatures, SourceHost, Span};

/// Strip `[|` / `|]` markers, returning the plain text and marked spans
fn parse_markup(marked: &str) -> (String, Vec<Span>) {
    let mut text = String::with_capacity(marked.len());
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut rest = marked;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("[|") {
            open.push(text.len());
            rest = after;
        } else if let Some(after) = rest.strip_prefix("|]") {
            let start = open.pop().expect("unbalanced markup");
            spans.push(Span::new(start, text.len()));
            rest = after;
        } else {
            let c = rest.chars().next().unwrap();
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    assert!(open.is_empty(), "unbalanced markup");
    spans.sort_by_key(|s| s.start);
    (text, spans)
}

fn verify_with(features: LanguageFeatures, marked: &str, expected: &[DiagnosticId]) {
    let (text, spans) = parse_markup(marked);
    assert_eq!(spans.len(), expected.len(), "one id per marked span");

    let host = SourceHost::new(features);
    let cancel = Cancellation::new();
    let compilation = host.compile(&text, &cancel).unwrap();
    let mut diagnostics = analyze(&compilation, &features, &cancel).unwrap();
    diagnostics.sort_by_key(|d| d.span.start);
    let actual: Vec<(DiagnosticId, String)> = diagnostics
        .into_iter()
        .map(|d| (d.rule_id, d.span.text(&text).to_string()))
        .collect();
    let wanted: Vec<(DiagnosticId, String)> = expected
        .iter()
        .zip(&spans)
        .map(|(id, span)| (*id, span.text(&text).to_string()))
        .collect();
    assert_eq!(actual, wanted);
}

fn verify(marked: &str, expected: &[DiagnosticId]) {
    verify_with(LanguageFeatures::latest(), marked, expected);
}

#[test]
fn test_markup_parser() {
    let (text, spans) = parse_markup("a [|bc|] d [|e|]");
    assert_eq!(text, "a bc d e");
    assert_eq!(spans, vec![Span::new(2, 4), Span::new(7, 8)]);
}

#[test]
fn test_token_accessibility() {
    verify(
        r#"using System.Threading;
using System.Threading.Tasks;

public class Orders
{
    public Task Place(int id, CancellationToken [|token|] = default) => Task.CompletedTask;
    protected internal Task Ship(CancellationToken [|token|] = default) => Task.CompletedTask;
    private protected Task Audit(CancellationToken [|token|] = default) => Task.CompletedTask;
    Task Load(CancellationToken [|token|]) => Task.CompletedTask;
    private Task Save(int id, CancellationToken [|first|], CancellationToken [|second|]) => Task.CompletedTask;
    Task Reload(CancellationToken token = default) => Task.CompletedTask;
    public Task Cancel(CancellationToken token) => Task.CompletedTask;
}
"#,
        &[
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenPrivateOptional,
            DiagnosticId::CancellationTokenPrivateOptional,
            DiagnosticId::CancellationTokenPrivateOptional,
        ],
    );
}

#[test]
fn test_token_on_constructors_and_delegates() {
    verify(
        r#"using System.Threading;

public delegate void Callback(CancellationToken [|token|] = default);

public class Poller
{
    delegate void Tick(CancellationToken [|token|]);

    public Poller(CancellationToken [|token|] = default) { }
    Poller(int interval, CancellationToken [|token|]) { }
}
"#,
        &[
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenPrivateOptional,
            DiagnosticId::CancellationTokenNonPrivateRequired,
            DiagnosticId::CancellationTokenPrivateOptional,
        ],
    );
}

#[test]
fn test_interface_members_follow_language_features() {
    let marked = r#"using System.Threading;
using System.Threading.Tasks;

public interface IStore
{
    Task Save(CancellationToken [|token|] = default);
}
"#;
    verify(marked, &[DiagnosticId::CancellationTokenNonPrivateRequired]);
    verify_with(
        LanguageFeatures::legacy(),
        marked,
        &[DiagnosticId::CancellationTokenNonPrivateRequired],
    );
}

#[test]
fn test_dropped_tasks() {
    verify(
        r#"using System;
using System.Threading.Tasks;

class Worker
{
    Task Run() => Task.CompletedTask;
    Task<int> Count() => Task.FromResult(1);
    void Sync() { }

    async Task Execute()
    {
        [|Run()|];
        [|Count()|];
        await Run();
        var pending = Run();
        _ = Count();
        Sync();
        Func<Task> work = Run;
        [|work()|];
        [|Task.Delay(100)|];
    }
}
"#,
        &[
            DiagnosticId::DroppedTask,
            DiagnosticId::DroppedTask,
            DiagnosticId::DroppedTask,
            DiagnosticId::DroppedTask,
        ],
    );
}

#[test]
fn test_catch_all_around_cancellable_work() {
    verify(
        r#"using System;
using System.Threading;
using System.Threading.Tasks;

class Poller
{
    Task Work(CancellationToken token = default) => Task.CompletedTask;

    async Task Poll(CancellationToken token = default)
    {
        try
        {
            await Work(token);
        }
        [|catch|] (Exception)
        {
        }

        try
        {
            await Work(token);
        }
        catch (Exception ex) when (!(ex is OperationCanceledException))
        {
        }

        try
        {
            await Work(token);
        }
        catch (OperationCanceledException)
        {
            throw;
        }
        catch (Exception)
        {
        }

        try
        {
            await Work(CancellationToken.None);
        }
        catch (Exception)
        {
        }
    }
}
"#,
        &[DiagnosticId::CatchAllShouldOmitOperationCanceled],
    );
}

#[test]
fn test_handler_completeness() {
    verify(
        r#"using System.Threading;
using System.Threading.Tasks;
using NServiceBus;

class OrderPlaced { }
class OrderShipped { }

class OrderSaga : [|IAmStartedByMessages<OrderPlaced>|], IHandleMessages<OrderShipped>
{
    public Task Handle(OrderShipped message, IMessageHandlerContext context, CancellationToken token) => Task.CompletedTask;
}

struct Audit : [|IHandleMessages<OrderShipped>|]
{
}
"#,
        &[
            DiagnosticId::MustImplementIHandleMessages,
            DiagnosticId::MustImplementIHandleMessages,
        ],
    );
}

#[test]
fn test_rules_together() {
    verify(
        r#"using System;
using System.Threading;
using System.Threading.Tasks;
using NServiceBus;

class OrderPlaced { }

class OrderHandler : [|IHandleMessages<OrderPlaced>|]
{
    Task Save(OrderPlaced order, CancellationToken [|token|]) => Task.CompletedTask;

    async Task Process(OrderPlaced order, CancellationToken token = default)
    {
        try
        {
            [|Save(order, token)|];
        }
        [|catch|]
        {
        }
    }
}
"#,
        &[
            DiagnosticId::MustImplementIHandleMessages,
            DiagnosticId::CancellationTokenPrivateOptional,
            DiagnosticId::DroppedTask,
            DiagnosticId::CatchAllShouldOmitOperationCanceled,
        ],
    );
}

#[test]
fn test_clean_file() {
    verify(
        r#"using System.Threading;
using System.Threading.Tasks;

public class Clean
{
    public async Task Run(CancellationToken token)
    {
        await Step(token);
    }

    Task Step(CancellationToken token = default) => Task.CompletedTask;
}
"#,
        &[],
    );
}
