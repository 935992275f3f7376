//! Address-Space Integration Tests
//!
//! Loading user programs through the kernel:
//! - Frame placement and backing-store overflow
//! - Byte-for-byte placement of image pages
//! - Frame and slot reclamation when a program's thread finishes

use core_types::OwnerId;
use hal::{MachineHal, Register};
use sim_kernel::noff::{NoffImageBuilder, NOFF_HEADER_SIZE};
use sim_kernel::test_utils::{boot, code_image, leave_free_frames, occupy_all_frames};
use sim_kernel::{AddrSpaceError, KernelConfig, KernelError, SchedulerPolicy, SimulatedKernel};

const PAGE: usize = 128;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A kernel whose user stack adds no pages, so page counts follow code size
fn stackless_kernel() -> SimulatedKernel {
    init_logger();
    let config = KernelConfig::new(SchedulerPolicy::Fcfs).with_user_stack_size(0);
    SimulatedKernel::new(config).unwrap()
}

#[test]
fn test_no_free_frames_goes_to_slots_zero_through_three() {
    let mut kernel = stackless_kernel();
    occupy_all_frames(&mut kernel);
    let frames_before = kernel.frames().clone();

    let image = code_image(4 * PAGE);
    kernel.file_system_mut().insert("prog", image.clone());
    let summary = kernel.exec("prog").unwrap();

    assert_eq!(summary.num_pages, 4);
    assert_eq!(summary.resident, 0);
    assert_eq!(summary.swapped, 4);

    let main = kernel.current_thread();
    let space = kernel.thread(main).unwrap().space.as_ref().unwrap();
    let slots: Vec<_> = space.page_table().iter().map(|e| e.slot()).collect();
    assert_eq!(slots, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert!(space.page_table().iter().all(|e| !e.is_resident()));

    // Frame table untouched
    for index in 0..frames_before.len() {
        assert_eq!(kernel.frames().get(index), frames_before.get(index));
    }

    for slot in 0..4 {
        let offset = NOFF_HEADER_SIZE + slot * PAGE;
        assert_eq!(
            kernel.backing_store().block(slot).unwrap(),
            &image[offset..offset + PAGE]
        );
    }
}

#[test]
fn test_partial_fit_makes_min_resident() {
    for free in [0, 1, 3, 6, 10] {
        let mut kernel = stackless_kernel();
        leave_free_frames(&mut kernel, free);
        let used_before = kernel.frames().used_count();

        kernel
            .file_system_mut()
            .insert("prog", code_image(6 * PAGE));
        let summary = kernel.exec("prog").unwrap();

        let expected_resident = free.min(6);
        assert_eq!(summary.resident, expected_resident, "free = {}", free);
        assert_eq!(summary.swapped, 6 - expected_resident, "free = {}", free);
        assert_eq!(
            kernel.frames().used_count() - used_before,
            expected_resident
        );
        assert_eq!(kernel.swap().used_count(), 6 - expected_resident);

        let main = kernel.current_thread();
        let space = kernel.thread(main).unwrap().space.as_ref().unwrap();
        let (resident, swapped): (Vec<&core_types::TranslationEntry>, Vec<_>) =
            space.page_table().iter().partition(|e| e.is_resident());
        assert_eq!(resident.len(), expected_resident);
        // Swapped pages take the lowest slots in page order
        for (slot, entry) in swapped.iter().enumerate() {
            assert_eq!(entry.slot(), Some(slot));
        }
    }
}

#[test]
fn test_resident_pages_match_image_bytes() {
    let mut kernel = stackless_kernel();
    // Scatter the free frames so placement is not the identity
    kernel.frames_mut().reserve(0);
    kernel.frames_mut().reserve(2);

    let image = code_image(5 * PAGE + 17);
    kernel.file_system_mut().insert("prog", image.clone());
    kernel.exec("prog").unwrap();

    let main = kernel.current_thread();
    let space = kernel.thread(main).unwrap().space.as_ref().unwrap();
    let memory = kernel.machine().main_memory();

    for entry in space.page_table() {
        let frame = entry.frame().unwrap();
        let offset = NOFF_HEADER_SIZE + entry.virtual_page * PAGE;
        let end = (offset + PAGE).min(image.len());
        let page = &memory[frame * PAGE..(frame + 1) * PAGE];

        assert_eq!(&page[..end - offset], &image[offset..end]);
        assert!(page[end - offset..].iter().all(|&b| b == 0));
    }
    assert_eq!(space.page_table()[0].frame(), Some(1));
    assert_eq!(space.page_table()[1].frame(), Some(3));
}

#[test]
fn test_frames_record_reverse_mapping() {
    let mut kernel = stackless_kernel();
    kernel
        .file_system_mut()
        .insert("prog", code_image(3 * PAGE));
    kernel.exec("prog").unwrap();

    for vpn in 0..3 {
        let info = kernel.frames().get(vpn).unwrap();
        assert!(info.used);
        assert_eq!(info.owner, Some(OwnerId::new(1)));
        assert_eq!(info.virtual_page, Some(vpn));
    }
}

#[test]
fn test_owner_ids_increase_per_exec() {
    let mut kernel = stackless_kernel();
    kernel.file_system_mut().insert("a", code_image(PAGE));
    kernel.file_system_mut().insert("b", code_image(PAGE));

    kernel.exec("a").unwrap();
    let main = kernel.current_thread();
    let first = kernel.thread(main).unwrap().space.as_ref().unwrap().owner();

    // Replacing the program frees the old frames before loading
    kernel.exec("b").unwrap();
    let second = kernel.thread(main).unwrap().space.as_ref().unwrap().owner();

    assert_eq!(first, OwnerId::new(1));
    assert_eq!(second, OwnerId::new(2));
    assert_eq!(kernel.frames().used_count(), 1);
    assert_eq!(kernel.frames().get(0).unwrap().owner, Some(second));
}

#[test]
fn test_big_endian_image_loads() {
    let mut kernel = stackless_kernel();
    let code = vec![0x42; 2 * PAGE];
    let image = NoffImageBuilder::new().code(code).big_endian().build();
    kernel.file_system_mut().insert("be", image);

    let summary = kernel.exec("be").unwrap();
    assert_eq!(summary.num_pages, 2);
    assert!(kernel.machine().main_memory()[..2 * PAGE]
        .iter()
        .all(|&b| b == 0x42));
}

#[test]
fn test_missing_image_is_recoverable() {
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    let err = kernel.exec("no-such-program").unwrap_err();
    assert!(matches!(
        err,
        KernelError::AddrSpace(AddrSpaceError::ImageNotFound { ref name }) if name == "no-such-program"
    ));

    // The kernel keeps working
    kernel.file_system_mut().insert("prog", code_image(PAGE));
    assert!(kernel.exec("prog").is_ok());
}

#[test]
fn test_stack_pointer_at_top_of_space() {
    init_logger();
    let mut kernel = boot(SchedulerPolicy::Fcfs).unwrap();
    kernel.file_system_mut().insert("prog", code_image(300));
    let summary = kernel.exec("prog").unwrap();

    // (300 + 1024) / 128 rounded up
    assert_eq!(summary.num_pages, 11);
    assert_eq!(
        kernel.machine().read_register(Register::Stack.index()),
        (11 * PAGE - 16) as i32
    );
    assert_eq!(kernel.machine().read_register(Register::NextPc.index()), 4);
}

#[test]
fn test_finished_program_returns_frames_and_slots() {
    let mut kernel = stackless_kernel();
    leave_free_frames(&mut kernel, 2);
    let used_before = kernel.frames().used_count();

    kernel
        .file_system_mut()
        .insert("prog", code_image(5 * PAGE));
    kernel.exec("prog").unwrap();
    assert_eq!(kernel.swap().used_count(), 3);

    let survivor = kernel.fork("survivor", 0, 0);
    kernel.finish().unwrap();

    assert_eq!(kernel.current_thread(), survivor);
    assert_eq!(kernel.frames().used_count(), used_before);
    assert_eq!(kernel.swap().used_count(), 0);
}

#[test]
fn test_init_data_lands_at_its_address() {
    let mut kernel = stackless_kernel();
    let image = NoffImageBuilder::new()
        .code(vec![0x11; PAGE])
        .init_data(vec![0x99; 40])
        .build();
    kernel.file_system_mut().insert("prog", image);
    kernel.exec("prog").unwrap();

    let memory = kernel.machine().main_memory();
    assert!(memory[PAGE..PAGE + 40].iter().all(|&b| b == 0x99));
}

#[test]
fn test_empty_image_without_stack_is_rejected() {
    let mut kernel = stackless_kernel();
    kernel
        .file_system_mut()
        .insert("empty", NoffImageBuilder::new().build());

    let err = kernel.exec("empty").unwrap_err();
    assert!(matches!(
        err,
        KernelError::AddrSpace(AddrSpaceError::SpaceTooSmall { size: 0, .. })
    ));
    assert_eq!(kernel.machine().run_count(), 0);
    assert_eq!(kernel.frames().used_count(), 0);
}

#[test]
fn test_space_smaller_than_stack_margin_is_rejected() {
    init_logger();
    let config = KernelConfig {
        page_size: 8,
        user_stack_size: 4,
        ..KernelConfig::new(SchedulerPolicy::Fcfs)
    };
    let mut kernel = SimulatedKernel::new(config).unwrap();
    kernel
        .file_system_mut()
        .insert("tiny", NoffImageBuilder::new().build());

    let err = kernel.exec("tiny").unwrap_err();
    assert!(matches!(
        err,
        KernelError::AddrSpace(AddrSpaceError::SpaceTooSmall { size: 8, margin: 16 })
    ));
    assert_eq!(kernel.swap().used_count(), 0);
}
