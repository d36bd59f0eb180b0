//! Reference metadata
//!
//! Well-known framework types are declared as C# stubs and parsed with the
//! same front end as user code. Member bodies are omitted; only signatures
//! matter to the binder.

use super::declare::{declare, define};
use super::symbols::{Origin, TypeTable};
use crate::compiler::LanguageFeatures;
use crate::syntax::SyntaxTree;
use log::debug;
use once_cell::sync::Lazy;

pub const CORE_REFERENCE: &str = r#"
namespace System
{
    public class Object
    {
        public Object();
        public virtual string ToString();
        public virtual bool Equals(object obj);
        public virtual int GetHashCode();
        public Type GetType();
    }

    public abstract class ValueType { }
    public abstract class Enum : ValueType { }
    public abstract class Delegate { }
    public abstract class Array { public int Length { get; } }
    public class Attribute { }

    public struct Void { }
    public struct Boolean { }
    public struct Byte { }
    public struct SByte { }
    public struct Char { }
    public struct Int16 { }
    public struct UInt16 { }
    public struct Int32 { public static int Parse(string s); }
    public struct UInt32 { }
    public struct Int64 { }
    public struct UInt64 { }
    public struct Single { }
    public struct Double { }
    public struct Decimal { }
    public struct IntPtr { }
    public struct UIntPtr { }

    public sealed class String
    {
        public static readonly string Empty;
        public int Length { get; }
        public static bool IsNullOrEmpty(string value);
        public static bool IsNullOrWhiteSpace(string value);
        public static string Format(string format, params object[] args);
        public static string Join(string separator, params object[] values);
        public static string Concat(params object[] values);
        public bool Contains(string value);
        public bool StartsWith(string value);
        public bool EndsWith(string value);
        public string Trim();
        public string Replace(string oldValue, string newValue);
        public string Substring(int startIndex);
        public string Substring(int startIndex, int length);
        public string ToUpperInvariant();
        public string ToLowerInvariant();
    }

    public abstract class Type
    {
        public string Name { get; }
        public string FullName { get; }
    }

    public struct Nullable<T> where T : struct
    {
        public bool HasValue { get; }
        public T Value { get; }
        public T GetValueOrDefault();
    }

    public struct Guid
    {
        public static readonly Guid Empty;
        public static Guid NewGuid();
    }

    public struct TimeSpan
    {
        public static readonly TimeSpan Zero;
        public static TimeSpan FromMilliseconds(double value);
        public static TimeSpan FromSeconds(double value);
        public static TimeSpan FromMinutes(double value);
        public double TotalMilliseconds { get; }
    }

    public struct DateTime
    {
        public static DateTime Now { get; }
        public static DateTime UtcNow { get; }
    }

    public struct DateTimeOffset
    {
        public static DateTimeOffset Now { get; }
        public static DateTimeOffset UtcNow { get; }
    }

    public class EventArgs
    {
        public static readonly EventArgs Empty;
    }

    public interface IDisposable
    {
        void Dispose();
    }

    public interface IAsyncDisposable
    {
        System.Threading.Tasks.ValueTask DisposeAsync();
    }

    public class Exception
    {
        public Exception();
        public Exception(string message);
        public Exception(string message, Exception innerException);
        public virtual string Message { get; }
        public Exception InnerException { get; }
        public virtual string StackTrace { get; }
    }

    public class SystemException : Exception
    {
        public SystemException();
        public SystemException(string message);
        public SystemException(string message, Exception innerException);
    }

    public class OperationCanceledException : SystemException
    {
        public OperationCanceledException();
        public OperationCanceledException(string message);
        public OperationCanceledException(System.Threading.CancellationToken token);
        public OperationCanceledException(string message, System.Threading.CancellationToken token);
        public OperationCanceledException(string message, Exception innerException);
        public System.Threading.CancellationToken CancellationToken { get; }
    }

    public class InvalidOperationException : SystemException
    {
        public InvalidOperationException();
        public InvalidOperationException(string message);
        public InvalidOperationException(string message, Exception innerException);
    }

    public class ArgumentException : SystemException
    {
        public ArgumentException();
        public ArgumentException(string message);
        public ArgumentException(string message, string paramName);
    }

    public class ArgumentNullException : ArgumentException
    {
        public ArgumentNullException();
        public ArgumentNullException(string paramName);
        public ArgumentNullException(string paramName, string message);
    }

    public class ArgumentOutOfRangeException : ArgumentException
    {
        public ArgumentOutOfRangeException();
        public ArgumentOutOfRangeException(string paramName);
        public ArgumentOutOfRangeException(string paramName, string message);
    }

    public class NotImplementedException : SystemException
    {
        public NotImplementedException();
        public NotImplementedException(string message);
    }

    public class NotSupportedException : SystemException
    {
        public NotSupportedException();
        public NotSupportedException(string message);
    }

    public class TimeoutException : SystemException
    {
        public TimeoutException();
        public TimeoutException(string message);
    }

    public class AggregateException : Exception
    {
        public AggregateException();
        public AggregateException(string message);
        public AggregateException(params Exception[] innerExceptions);
    }

    public static class Console
    {
        public static void WriteLine();
        public static void WriteLine(string value);
        public static void WriteLine(object value);
        public static void WriteLine(string format, params object[] arg);
        public static void Write(string value);
        public static void Write(object value);
        public static string ReadLine();
    }

    public static class Math
    {
        public static int Max(int val1, int val2);
        public static int Min(int val1, int val2);
        public static double Round(double value);
    }

    public delegate void Action();
    public delegate void Action<T>(T obj);
    public delegate void Action<T1, T2>(T1 arg1, T2 arg2);
    public delegate void Action<T1, T2, T3>(T1 arg1, T2 arg2, T3 arg3);
    public delegate void Action<T1, T2, T3, T4>(T1 arg1, T2 arg2, T3 arg3, T4 arg4);
    public delegate TResult Func<TResult>();
    public delegate TResult Func<T, TResult>(T arg);
    public delegate TResult Func<T1, T2, TResult>(T1 arg1, T2 arg2);
    public delegate TResult Func<T1, T2, T3, TResult>(T1 arg1, T2 arg2, T3 arg3);
    public delegate TResult Func<T1, T2, T3, T4, TResult>(T1 arg1, T2 arg2, T3 arg3, T4 arg4);
    public delegate bool Predicate<T>(T obj);
    public delegate void EventHandler(object sender, EventArgs e);
    public delegate void EventHandler<TEventArgs>(object sender, TEventArgs e);
}

namespace System.Collections
{
    public interface IEnumerable { }
}

namespace System.Collections.Generic
{
    public interface IEnumerator<T> : System.IDisposable
    {
        T Current { get; }
        bool MoveNext();
    }

    public interface IEnumerable<T> : System.Collections.IEnumerable
    {
        IEnumerator<T> GetEnumerator();
    }

    public interface IAsyncEnumerable<T> { }

    public interface ICollection<T> : IEnumerable<T>
    {
        int Count { get; }
        void Add(T item);
        bool Remove(T item);
        bool Contains(T item);
        void Clear();
    }

    public interface IList<T> : ICollection<T> { }

    public interface IReadOnlyCollection<T> : IEnumerable<T>
    {
        int Count { get; }
    }

    public interface IReadOnlyList<T> : IReadOnlyCollection<T> { }

    public struct KeyValuePair<TKey, TValue>
    {
        public TKey Key { get; }
        public TValue Value { get; }
    }

    public class List<T> : IList<T>, IReadOnlyList<T>
    {
        public List();
        public List(int capacity);
        public List(IEnumerable<T> collection);
        public int Count { get; }
        public void Add(T item);
        public void AddRange(IEnumerable<T> collection);
        public bool Remove(T item);
        public bool Contains(T item);
        public void Clear();
        public T[] ToArray();
        public void ForEach(System.Action<T> action);
    }

    public class HashSet<T> : ICollection<T>
    {
        public HashSet();
        public int Count { get; }
        public bool Add(T item);
        public bool Remove(T item);
        public bool Contains(T item);
        public void Clear();
    }

    public class Dictionary<TKey, TValue> : IEnumerable<KeyValuePair<TKey, TValue>>
    {
        public Dictionary();
        public int Count { get; }
        public void Add(TKey key, TValue value);
        public bool ContainsKey(TKey key);
        public bool TryGetValue(TKey key, out TValue value);
        public bool Remove(TKey key);
        public void Clear();
    }
}

namespace System.Threading
{
    public struct CancellationToken
    {
        public CancellationToken(bool canceled);
        public static CancellationToken None { get; }
        public bool IsCancellationRequested { get; }
        public bool CanBeCanceled { get; }
        public void ThrowIfCancellationRequested();
        public CancellationTokenRegistration Register(System.Action callback);
    }

    public struct CancellationTokenRegistration : System.IDisposable
    {
        public void Dispose();
    }

    public class CancellationTokenSource : System.IDisposable
    {
        public CancellationTokenSource();
        public CancellationTokenSource(int millisecondsDelay);
        public CancellationTokenSource(System.TimeSpan delay);
        public CancellationToken Token { get; }
        public bool IsCancellationRequested { get; }
        public void Cancel();
        public void CancelAfter(int millisecondsDelay);
        public void CancelAfter(System.TimeSpan delay);
        public void Dispose();
        public static CancellationTokenSource CreateLinkedTokenSource(params CancellationToken[] tokens);
    }

    public class SemaphoreSlim : System.IDisposable
    {
        public SemaphoreSlim(int initialCount);
        public SemaphoreSlim(int initialCount, int maxCount);
        public System.Threading.Tasks.Task WaitAsync();
        public System.Threading.Tasks.Task WaitAsync(CancellationToken cancellationToken);
        public int Release();
        public void Dispose();
    }

    public static class Interlocked
    {
        public static int Increment(ref int location);
        public static int Decrement(ref int location);
    }
}

namespace System.Threading.Tasks
{
    public class Task : System.IDisposable
    {
        public Task(System.Action action);
        public static Task CompletedTask { get; }
        public static TaskFactory Factory { get; }
        public bool IsCompleted { get; }
        public bool IsCanceled { get; }
        public bool IsFaulted { get; }
        public System.AggregateException Exception { get; }
        public static Task Delay(int millisecondsDelay);
        public static Task Delay(int millisecondsDelay, System.Threading.CancellationToken cancellationToken);
        public static Task Delay(System.TimeSpan delay);
        public static Task Delay(System.TimeSpan delay, System.Threading.CancellationToken cancellationToken);
        public static Task Run(System.Func<Task> function);
        public static Task Run(System.Func<Task> function, System.Threading.CancellationToken cancellationToken);
        public static Task<TResult> Run<TResult>(System.Func<TResult> function);
        public static Task WhenAll(params Task[] tasks);
        public static Task WhenAll(System.Collections.Generic.IEnumerable<Task> tasks);
        public static Task<Task> WhenAny(params Task[] tasks);
        public static Task<TResult> FromResult<TResult>(TResult result);
        public static Task FromCanceled(System.Threading.CancellationToken cancellationToken);
        public static Task FromException(System.Exception exception);
        public static Task Yield();
        public System.Runtime.CompilerServices.ConfiguredTaskAwaitable ConfigureAwait(bool continueOnCapturedContext);
        public System.Runtime.CompilerServices.TaskAwaiter GetAwaiter();
        public Task ContinueWith(System.Action<Task> continuationAction);
        public void Start();
        public void Wait();
        public void Dispose();
    }

    public class Task<TResult> : Task
    {
        public TResult Result { get; }
        public new System.Runtime.CompilerServices.ConfiguredTaskAwaitable<TResult> ConfigureAwait(bool continueOnCapturedContext);
        public new System.Runtime.CompilerServices.TaskAwaiter<TResult> GetAwaiter();
    }

    public struct ValueTask
    {
        public static ValueTask CompletedTask { get; }
        public Task AsTask();
        public System.Runtime.CompilerServices.ConfiguredValueTaskAwaitable ConfigureAwait(bool continueOnCapturedContext);
    }

    public struct ValueTask<TResult>
    {
        public ValueTask(TResult result);
        public TResult Result { get; }
        public Task<TResult> AsTask();
    }

    public class TaskCompletionSource<TResult>
    {
        public TaskCompletionSource();
        public Task<TResult> Task { get; }
        public void SetResult(TResult result);
        public bool TrySetResult(TResult result);
        public void SetException(System.Exception exception);
        public bool TrySetException(System.Exception exception);
        public void SetCanceled();
        public bool TrySetCanceled();
    }

    public class TaskFactory
    {
        public Task StartNew(System.Action action);
    }

    public class TaskCanceledException : System.OperationCanceledException
    {
        public TaskCanceledException();
        public TaskCanceledException(string message);
    }
}

namespace System.Runtime.CompilerServices
{
    public struct ConfiguredTaskAwaitable { }
    public struct ConfiguredTaskAwaitable<TResult> { }
    public struct ConfiguredValueTaskAwaitable { }
    public struct TaskAwaiter { public void GetResult(); }
    public struct TaskAwaiter<TResult> { public TResult GetResult(); }
}

namespace NServiceBus
{
    public interface IMessage { }
    public interface ICommand : IMessage { }
    public interface IEvent : IMessage { }

    public class SendOptions { public SendOptions(); }
    public class PublishOptions { public PublishOptions(); }
    public class ReplyOptions { public ReplyOptions(); }

    public interface ICancellableContext
    {
        System.Threading.CancellationToken CancellationToken { get; }
    }

    public interface IPipelineContext : ICancellableContext
    {
        System.Threading.Tasks.Task Send(object message);
        System.Threading.Tasks.Task Send(object message, SendOptions options);
        System.Threading.Tasks.Task SendLocal(object message);
        System.Threading.Tasks.Task Publish(object message);
        System.Threading.Tasks.Task Publish(object message, PublishOptions options);
    }

    public interface IMessageProcessingContext : IPipelineContext
    {
        string MessageId { get; }
        string ReplyToAddress { get; }
        System.Threading.Tasks.Task Reply(object message);
        System.Threading.Tasks.Task Reply(object message, ReplyOptions options);
        System.Threading.Tasks.Task ForwardCurrentMessageTo(string destination);
    }

    public interface IMessageHandlerContext : IMessageProcessingContext
    {
        void DoNotContinueDispatchingCurrentMessageToHandlers();
    }

    public interface IHandleMessages<T>
    {
        System.Threading.Tasks.Task Handle(T message, IMessageHandlerContext context);
    }

    public interface IAmStartedByMessages<T> : IHandleMessages<T> { }

    public interface IMessageSession
    {
        System.Threading.Tasks.Task Send(object message, System.Threading.CancellationToken cancellationToken = default);
        System.Threading.Tasks.Task SendLocal(object message, System.Threading.CancellationToken cancellationToken = default);
        System.Threading.Tasks.Task Publish(object message, System.Threading.CancellationToken cancellationToken = default);
    }

    public interface IEndpointInstance : IMessageSession
    {
        System.Threading.Tasks.Task Stop(System.Threading.CancellationToken cancellationToken = default);
    }
}
"#;

static CORE: Lazy<TypeTable> = Lazy::new(|| reference_table(&[]));

/// Table holding only the built-in reference stubs
pub fn core_table() -> &'static TypeTable {
    &CORE
}

/// Table built from the built-in stubs plus extra reference trees
pub fn reference_table(extra: &[SyntaxTree]) -> TypeTable {
    let core = SyntaxTree::parse(CORE_REFERENCE);
    let trees: Vec<&SyntaxTree> = std::iter::once(&core).chain(extra.iter()).collect();

    let mut table = TypeTable::new();
    let declared: Vec<_> = trees
        .iter()
        .map(|tree| declare(&mut table, tree.root(), Origin::Library))
        .collect();

    let features = LanguageFeatures::latest();
    for (tree, declared) in trees.iter().zip(&declared) {
        let errors = define(&mut table, tree.root(), tree.text(), declared, &features);
        if !errors.is_empty() {
            debug!(
                "reference metadata: {} unresolved signature part(s)",
                errors.len()
            );
        }
    }
    debug!("reference metadata: {} types", table.len());
    table
}
