//! End-to-end installation tests.
//!
//! Builds a simulated host with the method surface the reference deployment
//! patches (a tick method with a hard limit, two bar-fill methods, and a
//! method a host update removed), wires the configuration store to the
//! derived cache, installs the plan, and checks that rewritten call sites,
//! result hooks, and the safety clamp all answer from the same live values.

use std::sync::Arc;

use ilpatch::prelude::*;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A tick method body: two hard-limit sites (compare + store) on the same
/// literal, and the same value used once in unrelated arithmetic.
fn tick_body() -> InstructionStream {
    InstructionStream::new(vec![
        Instruction::bare(Opcode::Ldarg),
        Instruction::new(
            Opcode::Ldfld,
            Operand::Field(FieldRef::new("Character", "skill")),
        ),
        Instruction::load_f32(100.0),
        Instruction::new(Opcode::BleUnS, Operand::Target(8)),
        Instruction::bare(Opcode::Ldarg),
        Instruction::load_f32(100.0),
        Instruction::new(
            Opcode::Stfld,
            Operand::Field(FieldRef::new("Character", "skill")),
        ),
        Instruction::load_f32(100.0),
        Instruction::bare(Opcode::Mul),
        Instruction::bare(Opcode::Ret),
    ])
}

/// A bar-fill method body: the scale factor and both fill maxima, with one
/// of the matched values also appearing in arithmetic it must not touch.
fn bar_body() -> InstructionStream {
    InstructionStream::new(vec![
        Instruction::bare(Opcode::Ldarg),
        Instruction::load_f32(f64::from(0.01f32)),
        Instruction::bare(Opcode::Mul),
        Instruction::load_f32(0.5),
        Instruction::new(Opcode::BrS, Operand::Target(6)),
        Instruction::load_f32(0.6),
        Instruction::new(
            Opcode::Stfld,
            Operand::Field(FieldRef::new("Bar", "fillMax")),
        ),
        Instruction::load_f32(0.5),
        Instruction::bare(Opcode::Mul),
        Instruction::bare(Opcode::Ret),
    ])
}

fn limit_rule(cache: &Arc<DerivedCache>) -> RewriteRule {
    RewriteRule::new(
        100.0,
        ContextPredicate::FollowedByAny(vec![Opcode::BleUnS, Opcode::BleUn, Opcode::Stfld]),
        cache.provider(DerivedKind::MajorCap),
    )
    .expect(2)
}

fn bar_rules(cache: &Arc<DerivedCache>) -> Vec<RewriteRule> {
    vec![
        // The scale factor legitimately feeds a multiply, so its context is
        // an allow-set rather than the arithmetic deny-set.
        RewriteRule::new(
            0.01,
            ContextPredicate::FollowedByAny(vec![Opcode::Mul]),
            cache.provider(DerivedKind::FillFactor),
        ),
        RewriteRule::new(
            0.5,
            ContextPredicate::NotArithmetic,
            cache.provider(DerivedKind::MinorFillMax),
        ),
        RewriteRule::new(
            0.6,
            ContextPredicate::NotArithmetic,
            cache.provider(DerivedKind::TalentMinorFillMax),
        ),
    ]
}

struct Fixture {
    store: Arc<ConfigStore>,
    cache: Arc<DerivedCache>,
    host: HashRegistry,
    plan: PatchPlan,
    tick: MethodHandle,
    bar: MethodHandle,
}

fn fixture() -> Result<Fixture> {
    init_logs();

    let store = Arc::new(ConfigStore::new());
    let cache = Arc::new(DerivedCache::default());
    cache.attach(&store)?;

    let host = HashRegistry::new();
    let tick = host.register(TargetDescriptor::new("Character", "Learn"), tick_body())?;
    let bar = host.register(TargetDescriptor::new("Gui", "SetBar"), bar_body())?;

    let plan = PatchPlan::new()
        .with_target(
            TargetDescriptor::new("Character", "Learn"),
            vec![limit_rule(&cache)],
        )
        .with_target(TargetDescriptor::new("Gui", "SetBar"), bar_rules(&cache))
        .with_target(
            TargetDescriptor::new("Gui", "SetBarRemoved"),
            bar_rules(&cache),
        );

    Ok(Fixture {
        store,
        cache,
        host,
        plan,
        tick,
        bar,
    })
}

#[test]
fn install_rewrites_the_full_surface() -> Result<()> {
    let fx = fixture()?;
    let summary = install(&fx.plan, &fx.host);
    log_effective_caps(&fx.cache.snapshot());

    assert_eq!(summary.methods_patched(), 2);
    assert_eq!(summary.methods_missing(), 1);
    // 2 limit sites + 3 bar sites.
    assert_eq!(summary.replacements(), 5);
    assert_eq!(summary.outcomes()[2].status, MethodStatus::Unresolved);

    // Hard-limit sites call the provider; the arithmetic literal survives.
    let tick = fx.host.body(&fx.tick).expect("tick body");
    assert_eq!(
        tick[2].provider().map(ProviderRef::invoke),
        Some(500.0),
        "comparison site answers the configured major cap"
    );
    assert!(tick[5].provider().is_some());
    assert_eq!(tick[7], Instruction::load_f32(100.0));

    // Bar sites answer the derived ratios for 500/350/450.
    let bar = fx.host.body(&fx.bar).expect("bar body");
    assert_eq!(bar[1].provider().map(ProviderRef::invoke), Some(0.002));
    assert_eq!(bar[3].provider().map(ProviderRef::invoke), Some(0.7));
    assert_eq!(bar[5].provider().map(ProviderRef::invoke), Some(0.9));
    assert_eq!(bar[7], Instruction::load_f32(0.5));
    Ok(())
}

#[test]
fn providers_track_configuration_changes_without_reinstall() -> Result<()> {
    let fx = fixture()?;
    let _ = install(&fx.plan, &fx.host);

    fx.store.set("major-skill-cap", 1000.0)?;
    let bar = fx.host.body(&fx.bar).expect("bar body");
    assert_eq!(bar[1].provider().map(ProviderRef::invoke), Some(0.001));
    assert_eq!(bar[3].provider().map(ProviderRef::invoke), Some(0.35));
    Ok(())
}

#[test]
fn second_install_applies_nothing() -> Result<()> {
    let fx = fixture()?;
    assert_eq!(install(&fx.plan, &fx.host).replacements(), 5);

    let tick_once = fx.host.body(&fx.tick).expect("tick body");
    let again = install(&fx.plan, &fx.host);
    assert_eq!(again.replacements(), 0);
    assert_eq!(again.methods_patched(), 2);
    assert_eq!(fx.host.body(&fx.tick).expect("tick body"), tick_once);
    Ok(())
}

#[test]
fn clamp_and_hooks_agree_with_rewritten_sites() -> Result<()> {
    let fx = fixture()?;
    let _ = install(&fx.plan, &fx.host);
    let hooks = CapHooks::new(Arc::clone(&fx.store), Arc::clone(&fx.cache));

    // The "secondary jumps to maximum" bug: slot 1 ran away to the major
    // cap even though slot 0 is the primary discipline.
    let mut slots = vec![480.0, 500.0, 30.0];
    let written = hooks.clamp_after_tick(&mut slots, Some(0), false);
    assert_eq!(written, 1);
    assert_eq!(slots, vec![480.0, 350.0, 30.0]);

    // Idempotent: nothing left to write.
    assert_eq!(hooks.clamp_after_tick(&mut slots, Some(0), false), 0);

    // Result corrections map the vanilla getters onto the same caps.
    assert_eq!(hooks.secondary_cap(50.0), 350.0);
    assert_eq!(hooks.secondary_cap(60.0), 450.0);
    assert_eq!(hooks.secondary_cap(100.0), 100.0); // sandbox
    assert_eq!(hooks.primary_cap(100.0), 500.0);

    // Threshold normalization restores the vanilla 0..100 scale.
    assert_eq!(hooks.normalize(250.0), 50.0);
    Ok(())
}

#[test]
fn disabled_switch_neutralizes_hooks_but_not_providers() -> Result<()> {
    let fx = fixture()?;
    let _ = install(&fx.plan, &fx.host);
    let hooks = CapHooks::new(Arc::clone(&fx.store), Arc::clone(&fx.cache));

    fx.store.set_enabled(false);
    assert_eq!(hooks.secondary_cap(50.0), 50.0);
    let mut slots = vec![9999.0];
    assert_eq!(hooks.clamp_after_tick(&mut slots, None, false), 0);

    // Installed providers keep answering; hosts gate at the hook boundary.
    let bar = fx.host.body(&fx.bar).expect("bar body");
    assert_eq!(bar[3].provider().map(ProviderRef::invoke), Some(0.7));
    Ok(())
}

#[test]
fn hook_panics_never_escape_the_boundary() -> Result<()> {
    let fx = fixture()?;
    let hooks = CapHooks::new(Arc::clone(&fx.store), Arc::clone(&fx.cache));

    let corrected = guard_hook("secondary-cap", || hooks.secondary_cap(50.0));
    assert_eq!(corrected, Some(350.0));

    let poisoned: Option<f64> = guard_hook("broken", || panic!("host layout changed"));
    assert_eq!(poisoned, None);
    Ok(())
}
