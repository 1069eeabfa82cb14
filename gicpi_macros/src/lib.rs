//! Macros that generate low-level boilerplate code.
//!
//! gicpi firmware runs on core 0 only, at whatever exception level the
//! armstub left us in (EL2 by default, EL3 with `armstub` disabled). The
//! macros are limited to this use case.

use proc_macro::TokenStream;

use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Ident, ItemFn, Token};

/// Top of the boot stack. The stack grows down from the load address of the
/// kernel image.
const STACK_TOP: usize = 0x80000;

/// Returns the code of the entrypoint. Every core but core 0 is parked, core
/// 0 gets a stack and jumps to `fname_c`.
fn start_asm(fname_c: &str) -> String {
    format!(
        r#"
                // Park secondary cores.
                mrs x5, mpidr_el1
                and x5, x5, #0xff
                cbz x5, 2f
            1:
                wfe
                b 1b

            2:
                ldr x5, ={STACK_TOP:#x}
                mov sp, x5

                bl {fname_c}

            3:
                b 3b
        "#
    )
}

/// Returns the code of an exception handler stub calling `fname_c`. It saves
/// the caller-saved registers and returns with `eret`.
fn handler_asm(fname_c: &str) -> String {
    format!(
        r#"
            stp x0, x1, [sp, #-16]!
            stp x2, x3, [sp, #-16]!
            stp x4, x5, [sp, #-16]!
            stp x6, x7, [sp, #-16]!
            stp x8, x9, [sp, #-16]!
            stp x10, x11, [sp, #-16]!
            stp x12, x13, [sp, #-16]!
            stp x14, x15, [sp, #-16]!
            stp x16, x17, [sp, #-16]!
            stp x18, lr, [sp, #-16]!

            bl {fname_c}

            ldp x18, lr, [sp], #16
            ldp x16, x17, [sp], #16
            ldp x14, x15, [sp], #16
            ldp x12, x13, [sp], #16
            ldp x10, x11, [sp], #16
            ldp x8, x9, [sp], #16
            ldp x6, x7, [sp], #16
            ldp x4, x5, [sp], #16
            ldp x2, x3, [sp], #16
            ldp x0, x1, [sp], #16

            eret
        "#
    )
}

/// Symbol used by the vector table entries without handler.
const UNIMPLEMENTED_EXC: &str = "_gicpi_c_unimplemented_exc";

/// Returns the code of a vector table whose "current EL with SP_ELx" entries
/// branch to `handlers` (synchronous, IRQ, FIQ and SError). Every other entry
/// branches to [`UNIMPLEMENTED_EXC`].
fn vector_table_asm(handlers: &[String; 4]) -> String {
    let mut code = String::new();
    for group in 0..4 {
        for (i, handler) in handlers.iter().enumerate() {
            let target = if group == 1 {
                handler.as_str()
            } else {
                UNIMPLEMENTED_EXC
            };
            if group != 0 || i != 0 {
                code.push_str("            .balign 0x80\n");
            }
            code.push_str(&format!("            b {target}\n"));
        }
    }
    code
}

/// Generates the boilerplate required to call the provided function on boot.
///
/// It also generates a panic handler that reports through the UART.
///
/// Under the hood it specifies that the entrypoint must be placed into a
/// section called `.entry`.
///
/// The Raspberry Pi 4 Model B expects the entrypoint of the kernel to be at
/// 0x80000. Therefore, we need the linker to place the section `.entry` at
/// this address.
///
/// The following example shows how to do this using a Cargo configuration
/// file.
///
/// ```text
/// [target.aarch64-unknown-none]
/// rustflags = [
///     "-Clink-arg=--image-base=0x80000",
///     "-Clink-arg=--section-start=.entry=0x80000",
/// ]
/// ```
#[proc_macro_attribute]
pub fn entrypoint(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_fn = parse_macro_input!(item as ItemFn);

    let fname_rust = &item_fn.sig.ident;
    let fname_c = format_ident!("_gicpi_c_{}", fname_rust);

    let start_code = start_asm(&fname_c.to_string());

    let tokens = quote! {
        #[link_section = ".entry"]
        #[no_mangle]
        #[unsafe(naked)]
        unsafe extern "C" fn _start() -> ! {
            core::arch::naked_asm!(#start_code)
        }

        #[no_mangle]
        unsafe extern "C" fn #fname_c() {
            #fname_rust();
        }

        #[panic_handler]
        fn panic(info: &core::panic::PanicInfo) -> ! {
            gicpi::print!("\n\n!!! PANIC !!!\n\n");

            if let Some(location) = info.location() {
                gicpi::print!("{}:{}", location.file(), location.line());
            }

            gicpi::println!(": {}", info.message());

            loop {}
        }

        #item_fn
    };

    tokens.into()
}

/// Generates the boilerplate required to call the provided function as an
/// exception handler.
#[proc_macro_attribute]
pub fn exception_handler(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item_fn = parse_macro_input!(item as ItemFn);

    let fname_rust = &item_fn.sig.ident;
    let fname_asm = format_ident!("_gicpi_asm_{}", fname_rust);
    let fname_c = format_ident!("_gicpi_c_{}", fname_rust);

    let handler_code = handler_asm(&fname_c.to_string());

    let tokens = quote! {
        #[no_mangle]
        #[unsafe(naked)]
        unsafe extern "C" fn #fname_asm() -> ! {
            core::arch::naked_asm!(#handler_code)
        }

        #[no_mangle]
        unsafe extern "C" fn #fname_c() {
            #fname_rust()
        }

        #item_fn
    };

    tokens.into()
}

/// Represents the parameters of the [exception_vector_table] macro.
struct ExceptionVectorTableParams(Punctuated<Ident, Token![,]>);

impl Parse for ExceptionVectorTableParams {
    fn parse(input: ParseStream) -> syn::Result<ExceptionVectorTableParams> {
        let params = Punctuated::parse_terminated(input)?;
        Ok(ExceptionVectorTableParams(params))
    }
}

/// Generates an exception vector table.
///
/// It takes the following arguments, which must be functions annotated with
/// [`macro@exception_handler`]:
///
/// - `curr_el_spx_sync`: The exception handler for a synchronous exception
///   from the current EL using the current SP.
/// - `curr_el_spx_irq`: The exception handler for an IRQ exception from the
///   current EL using the current SP.
/// - `curr_el_spx_fiq`: The exception handler for an FIQ from the current EL
///   using the current SP.
/// - `curr_el_spx_serror`: The exception handler for a System Error exception
///   from the current EL using the current SP.
///
/// Under the hood it creates a symbol called `_exception_vector_table` and
/// specifies that it must be placed into a section called
/// `.exception_vector_table`.
///
/// Given that vector tables are usually not referenced by other code, we need
/// to ensure that the linker does not optimize them away. This can be done
/// with the linker flag `--undefined`, which forces the symbol to be entered
/// in the output file as an undefined symbol.
///
/// It is also necessary to set the location of the vector table in memory.
///
/// The following example shows how to do this using a Cargo configuration
/// file. It places the vector table at 0x90000.
///
/// ```text
/// [target.aarch64-unknown-none]
/// rustflags = [
///     "-Clink-arg=--undefined=_exception_vector_table",
///     "-Clink-arg=--section-start=.exception_vector_table=0x90000",
/// ]
/// ```
#[proc_macro]
pub fn exception_vector_table(item: TokenStream) -> TokenStream {
    let fnames = parse_macro_input!(item as ExceptionVectorTableParams);
    let fnames = fnames.0;

    if fnames.len() != 4 {
        panic!(
            "the number of entries must be 4: {} entries provided",
            fnames.len()
        );
    }

    let fnames_asm = [0, 1, 2, 3].map(|i| format!("_gicpi_asm_{}", fnames[i]));
    let vector_table_code = vector_table_asm(&fnames_asm);

    let tokens = quote! {
        #[link_section = ".exception_vector_table"]
        #[no_mangle]
        #[unsafe(naked)]
        unsafe extern "C" fn _exception_vector_table() -> ! {
            core::arch::naked_asm!(#vector_table_code)
        }

        #[no_mangle]
        unsafe extern "C" fn _gicpi_c_unimplemented_exc() {
            unimplemented!();
        }
    };

    tokens.into()
}
