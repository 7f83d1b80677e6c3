use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tern_vm_core::{VmContext, Value};

fn bench_job_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_job_queue");
    let n = 20_000usize;

    group.bench_function("fulfilled_then_fan_out", |b| {
        b.iter_batched(
            || {
                let mut ctx = VmContext::new();
                let promise_ctor = ctx.promise_constructor();
                let promise = ctx
                    .promise_resolve(&promise_ctor, Value::int32(1))
                    .expect("Promise.resolve");
                (ctx, promise)
            },
            |(mut ctx, promise)| {
                let noop = ctx.create_native_function("", 1, |_, _, _| Ok(Value::Undefined));
                for _ in 0..n {
                    ctx.invoke(&promise, "then", &[noop.clone()]).expect("then");
                }
                black_box(ctx.run_jobs(None).executed());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("then_chain", |b| {
        b.iter_batched(
            VmContext::new,
            |mut ctx| {
                let promise_ctor = ctx.promise_constructor();
                let identity = ctx.create_native_function("", 1, |_, _, args| {
                    Ok(args.first().cloned().unwrap_or_default())
                });
                let mut tail = ctx
                    .promise_resolve(&promise_ctor, Value::int32(0))
                    .expect("Promise.resolve");
                for _ in 0..n / 10 {
                    tail = ctx.invoke(&tail, "then", &[identity.clone()]).expect("then");
                }
                black_box(ctx.run_jobs(None).executed());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("all_over_resolved_array", |b| {
        b.iter_batched(
            || {
                let mut ctx = VmContext::new();
                let values = (0..1_000).map(Value::int32).collect();
                let array = ctx.create_array(values);
                (ctx, array)
            },
            |(mut ctx, array)| {
                let promise_ctor = ctx.promise_constructor();
                let all = ctx.promise_all(&promise_ctor, &array).expect("Promise.all");
                ctx.run_jobs(None);
                black_box(ctx.promise_state(&all));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_job_queue);
criterion_main!(benches);
